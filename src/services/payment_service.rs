use validator::Validate;

use crate::{
    audit::log_audit,
    dto::payments::{
        ConfirmPaymentRequest, PaymentIntentRequest, PaymentOutcome, WEBHOOK_FAILED,
        WEBHOOK_SUCCEEDED, WebhookAck, WebhookEvent,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, PaymentStatus},
    notify::OrderEvent,
    response::{ApiResponse, Meta},
    services::order_service::find_visible_order,
    state::AppState,
};

const PAYMENT_CAS_ATTEMPTS: usize = 3;

/// Attach the gateway reference the client obtained for this order.
pub async fn register_reference(
    state: &AppState,
    user: &AuthUser,
    payload: PaymentIntentRequest,
) -> AppResult<ApiResponse<Order>> {
    payload.validate()?;
    let order = find_visible_order(state, user, payload.order_id).await?;

    if order.payment_status == PaymentStatus::Completed {
        return Err(AppError::InvalidState("Payment already completed".into()));
    }

    let order = state
        .store
        .orders
        .set_payment_reference(order.id, &payload.payment_reference)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    tracing::info!(order_id = %order.id, "payment reference registered");
    Ok(ApiResponse::success(
        "Payment reference registered",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn confirm_payment(
    state: &AppState,
    user: &AuthUser,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<Order>> {
    payload.validate()?;
    let order = find_visible_order(state, user, payload.order_id).await?;

    if order.payment_reference.as_deref() != Some(payload.payment_reference.as_str()) {
        return Err(AppError::PaymentMismatch);
    }

    let target = match payload.outcome {
        PaymentOutcome::Succeeded => PaymentStatus::Completed,
        PaymentOutcome::Failed => PaymentStatus::Failed,
    };
    let order = apply_payment_status(state, order, target).await?;

    log_audit(
        state,
        Some(user.user_id),
        "payment_confirm",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "payment_status": order.payment_status })),
    )
    .await;

    let message = match order.payment_status {
        PaymentStatus::Completed => "Payment confirmed",
        PaymentStatus::Failed => "Payment failed",
        PaymentStatus::Pending => "Payment pending",
    };
    Ok(ApiResponse::success(message, order, Some(Meta::empty())))
}

/// Gateway callback. Unknown event types and references are acknowledged so the
/// gateway stops retrying.
pub async fn handle_webhook(
    state: &AppState,
    provided_secret: Option<&str>,
    event: WebhookEvent,
) -> AppResult<ApiResponse<WebhookAck>> {
    let expected = state
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Webhook secret is not configured".into()))?;
    if provided_secret != Some(expected) {
        return Err(AppError::Unauthorized("Invalid webhook secret".into()));
    }

    let target = match event.event_type.as_str() {
        WEBHOOK_SUCCEEDED => PaymentStatus::Completed,
        WEBHOOK_FAILED => PaymentStatus::Failed,
        other => {
            tracing::debug!(event_type = other, "ignoring webhook event");
            return Ok(ack());
        }
    };

    let reference = event.data.object.id;
    match state
        .store
        .orders
        .find_by_payment_reference(&reference)
        .await?
    {
        Some(order) => {
            apply_payment_status(state, order, target).await?;
        }
        None => {
            tracing::warn!(%reference, event_type = %event.event_type, "webhook for unknown payment reference");
        }
    }

    Ok(ack())
}

fn ack() -> ApiResponse<WebhookAck> {
    ApiResponse::success("Webhook received", WebhookAck { received: true }, Some(Meta::empty()))
}

/// Compare-and-set the payment status. Disallowed or already-applied
/// transitions return the order unchanged without emitting anything.
async fn apply_payment_status(
    state: &AppState,
    order: Order,
    target: PaymentStatus,
) -> AppResult<Order> {
    let mut current = order;

    for _ in 0..PAYMENT_CAS_ATTEMPTS {
        let from = current.payment_status;
        if !from.can_transition_to(target) {
            tracing::debug!(order_id = %current.id, %from, %target, "payment transition ignored");
            return Ok(current);
        }

        match state
            .store
            .orders
            .transition_payment(current.id, from, target)
            .await?
        {
            Some(updated) => {
                tracing::info!(order_id = %updated.id, %from, to = %target, "payment status changed");
                let event = if target == PaymentStatus::Completed {
                    OrderEvent::PaymentCompleted(updated.clone())
                } else {
                    OrderEvent::PaymentFailed(updated.clone())
                };
                state.notifier.notify(event);
                return Ok(updated);
            }
            None => {
                current = state
                    .store
                    .orders
                    .find_order(current.id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Order"))?;
            }
        }
    }

    Ok(current)
}
