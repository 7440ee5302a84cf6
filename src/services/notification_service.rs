use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::log_audit,
    dto::notifications::{
        AffectedCount, BulkNotificationRequest, NotificationList, SendNotificationRequest,
        UnreadCount,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Notification, NotificationType},
    repository::{NewNotification, NotificationFilter, Page},
    response::{ApiResponse, Meta},
    routes::params::NotificationQuery,
    state::AppState,
};

pub async fn list_notifications(
    state: &AppState,
    user: &AuthUser,
    query: NotificationQuery,
) -> AppResult<ApiResponse<NotificationList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let filter = NotificationFilter {
        notification_type: query.notification_type,
        is_read: query.is_read,
    };

    let repo = &state.store.notifications;
    let (items, total) = repo
        .list_notifications(user.user_id, &filter, Page::new(limit, offset))
        .await?;
    let unread_count = repo.unread_count(user.user_id).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Notifications",
        NotificationList {
            items,
            unread_count,
        },
        Some(meta),
    ))
}

pub async fn unread_count(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UnreadCount>> {
    let unread_count = state.store.notifications.unread_count(user.user_id).await?;
    Ok(ApiResponse::success(
        "Unread count",
        UnreadCount { unread_count },
        Some(Meta::empty()),
    ))
}

pub async fn mark_read(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Notification>> {
    let notification = state
        .store
        .notifications
        .mark_read(user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Notification"))?;
    Ok(ApiResponse::success(
        "Notification marked as read",
        notification,
        Some(Meta::empty()),
    ))
}

pub async fn mark_all_read(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AffectedCount>> {
    let affected = state.store.notifications.mark_all_read(user.user_id).await?;
    Ok(ApiResponse::success(
        "All notifications marked as read",
        AffectedCount { affected },
        Some(Meta::empty()),
    ))
}

pub async fn delete_notification(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<AffectedCount>> {
    if !state
        .store
        .notifications
        .delete_notification(user.user_id, id)
        .await?
    {
        return Err(AppError::not_found("Notification"));
    }
    Ok(ApiResponse::success(
        "Notification deleted",
        AffectedCount { affected: 1 },
        Some(Meta::empty()),
    ))
}

pub async fn clear_notifications(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AffectedCount>> {
    let affected = state
        .store
        .notifications
        .clear_notifications(user.user_id)
        .await?;
    Ok(ApiResponse::success(
        "Notifications cleared",
        AffectedCount { affected },
        Some(Meta::empty()),
    ))
}

pub async fn send_notification(
    state: &AppState,
    user: &AuthUser,
    payload: SendNotificationRequest,
) -> AppResult<ApiResponse<Notification>> {
    ensure_admin(user)?;
    payload.validate()?;

    if state.store.users.find_user(payload.user_id).await?.is_none() {
        return Err(AppError::not_found("User"));
    }

    let notification = state
        .store
        .notifications
        .insert_notification(NewNotification {
            user_id: payload.user_id,
            title: payload.title,
            message: payload.message,
            notification_type: payload.notification_type.unwrap_or(NotificationType::System),
            related_order: payload.related_order,
            related_product: payload.related_product,
        })
        .await?;

    log_audit(
        state,
        Some(user.user_id),
        "notification_send",
        Some("notifications"),
        Some(serde_json::json!({ "notification_id": notification.id, "user_id": notification.user_id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Notification sent",
        notification,
        Some(Meta::empty()),
    ))
}

pub async fn send_bulk(
    state: &AppState,
    user: &AuthUser,
    payload: BulkNotificationRequest,
) -> AppResult<ApiResponse<AffectedCount>> {
    ensure_admin(user)?;
    payload.validate()?;

    let notification_type = payload.notification_type.unwrap_or(NotificationType::System);
    let mut user_ids = payload.user_ids;
    user_ids.sort();
    user_ids.dedup();

    let mut recipients = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        if state.store.users.find_user(user_id).await?.is_some() {
            recipients.push(user_id);
        } else {
            tracing::warn!(%user_id, "skipping unknown notification recipient");
        }
    }

    let batch = recipients
        .iter()
        .map(|user_id| NewNotification {
            user_id: *user_id,
            title: payload.title.clone(),
            message: payload.message.clone(),
            notification_type,
            related_order: None,
            related_product: None,
        })
        .collect();

    let affected = state.store.notifications.insert_notifications(batch).await?;

    log_audit(
        state,
        Some(user.user_id),
        "notification_send_bulk",
        Some("notifications"),
        Some(serde_json::json!({ "recipients": affected })),
    )
    .await;

    Ok(ApiResponse::success(
        "Notifications sent",
        AffectedCount { affected },
        Some(Meta::empty()),
    ))
}
