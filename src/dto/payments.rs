use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct PaymentIntentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "payment reference is required"))]
    pub payment_reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ConfirmPaymentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "payment reference is required"))]
    pub payment_reference: String,
    pub outcome: PaymentOutcome,
}

pub const WEBHOOK_SUCCEEDED: &str = "payment_intent.succeeded";
pub const WEBHOOK_FAILED: &str = "payment_intent.payment_failed";

/// Gateway event envelope: `{ "type": ..., "data": { "object": { "id": ... } } }`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct WebhookData {
    pub object: WebhookObject,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct WebhookObject {
    pub id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}
