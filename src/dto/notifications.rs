use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Notification, NotificationType};

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationList {
    pub items: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AffectedCount {
    pub affected: u64,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct SendNotificationRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    pub notification_type: Option<NotificationType>,
    pub related_order: Option<Uuid>,
    pub related_product: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct BulkNotificationRequest {
    #[validate(length(min = 1, message = "user_ids must not be empty"))]
    pub user_ids: Vec<Uuid>,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    pub notification_type: Option<NotificationType>,
}
