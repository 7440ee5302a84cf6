use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};

use crate::{
    dto::payments::{ConfirmPaymentRequest, PaymentIntentRequest, WebhookAck, WebhookEvent},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/intent", post(register_intent))
        .route("/confirm", post(confirm_payment))
        .route("/webhook", post(webhook))
}

#[utoipa::path(
    post,
    path = "/api/payments/intent",
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Attach a gateway payment reference", body = ApiResponse<Order>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Payment already completed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn register_intent(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PaymentIntentRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = payment_service::register_reference(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/confirm",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Confirm payment outcome", body = ApiResponse<Order>),
        (status = 400, description = "Payment reference does not match"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = payment_service::confirm_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = WebhookEvent,
    params(("x-webhook-secret" = String, Header, description = "Shared webhook secret")),
    responses(
        (status = 200, description = "Event acknowledged", body = ApiResponse<WebhookAck>),
        (status = 401, description = "Missing or invalid secret")
    ),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<WebhookEvent>,
) -> AppResult<Json<ApiResponse<WebhookAck>>> {
    let secret = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    let resp = payment_service::handle_webhook(&state, secret, event).await?;
    Ok(Json(resp))
}
