mod common;

use common::{TestApp, WEBHOOK_SECRET, purchase};
use rental_commerce_api::{
    dto::payments::{
        ConfirmPaymentRequest, PaymentIntentRequest, PaymentOutcome, WEBHOOK_FAILED,
        WEBHOOK_SUCCEEDED, WebhookData, WebhookEvent, WebhookObject,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{Order, PaymentStatus, Role},
    repository::OrderRepository,
    services::{order_service, payment_service},
};

async fn placed_order(app: &TestApp, user: &AuthUser) -> Order {
    let product = app.product(250, 10).await;
    order_service::create_order(&app.state, user, purchase(&[(product.id, 1)]))
        .await
        .expect("create order")
        .data
        .expect("order")
}

async fn with_reference(app: &TestApp, user: &AuthUser, reference: &str) -> Order {
    let order = placed_order(app, user).await;
    payment_service::register_reference(
        &app.state,
        user,
        PaymentIntentRequest {
            order_id: order.id,
            payment_reference: reference.to_string(),
        },
    )
    .await
    .expect("register reference")
    .data
    .expect("order")
}

fn event(event_type: &str, reference: &str) -> WebhookEvent {
    WebhookEvent {
        event_type: event_type.to_string(),
        data: WebhookData {
            object: WebhookObject {
                id: reference.to_string(),
            },
        },
    }
}

#[tokio::test]
async fn confirm_completes_payment_once() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let order = with_reference(&app, &user, "pi_123").await;
    assert_eq!(order.payment_reference.as_deref(), Some("pi_123"));

    let confirm = || ConfirmPaymentRequest {
        order_id: order.id,
        payment_reference: "pi_123".into(),
        outcome: PaymentOutcome::Succeeded,
    };

    let paid = payment_service::confirm_payment(&app.state, &user, confirm())
        .await?
        .data
        .expect("order");
    assert_eq!(paid.payment_status, PaymentStatus::Completed);

    let again = payment_service::confirm_payment(&app.state, &user, confirm())
        .await?
        .data
        .expect("order");
    assert_eq!(again.payment_status, PaymentStatus::Completed);

    let completed = app
        .notifier
        .kinds()
        .into_iter()
        .filter(|k| *k == "payment_completed")
        .count();
    assert_eq!(completed, 1);
    Ok(())
}

#[tokio::test]
async fn confirm_rejects_a_mismatched_reference() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let order = with_reference(&app, &user, "pi_real").await;

    let err = payment_service::confirm_payment(
        &app.state,
        &user,
        ConfirmPaymentRequest {
            order_id: order.id,
            payment_reference: "pi_forged".into(),
            outcome: PaymentOutcome::Succeeded,
        },
    )
    .await
    .expect_err("reference differs");
    assert!(matches!(err, AppError::PaymentMismatch));

    let stored = app.store.find_order(order.id).await?.expect("order");
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn confirm_without_registered_reference_is_a_mismatch() {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let order = placed_order(&app, &user).await;

    let err = payment_service::confirm_payment(
        &app.state,
        &user,
        ConfirmPaymentRequest {
            order_id: order.id,
            payment_reference: "pi_any".into(),
            outcome: PaymentOutcome::Succeeded,
        },
    )
    .await
    .expect_err("nothing registered");
    assert!(matches!(err, AppError::PaymentMismatch));
}

#[tokio::test]
async fn failed_payment_can_still_complete() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let order = with_reference(&app, &user, "pi_retry").await;

    let failed = payment_service::confirm_payment(
        &app.state,
        &user,
        ConfirmPaymentRequest {
            order_id: order.id,
            payment_reference: "pi_retry".into(),
            outcome: PaymentOutcome::Failed,
        },
    )
    .await?;
    assert_eq!(failed.message, "Payment failed");
    assert_eq!(
        failed.data.expect("order").payment_status,
        PaymentStatus::Failed
    );

    let paid = payment_service::confirm_payment(
        &app.state,
        &user,
        ConfirmPaymentRequest {
            order_id: order.id,
            payment_reference: "pi_retry".into(),
            outcome: PaymentOutcome::Succeeded,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(paid.payment_status, PaymentStatus::Completed);

    let late_failure = payment_service::confirm_payment(
        &app.state,
        &user,
        ConfirmPaymentRequest {
            order_id: order.id,
            payment_reference: "pi_retry".into(),
            outcome: PaymentOutcome::Failed,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(late_failure.payment_status, PaymentStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn completed_orders_refuse_a_new_reference() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let order = with_reference(&app, &user, "pi_done").await;
    payment_service::handle_webhook(
        &app.state,
        Some(WEBHOOK_SECRET),
        event(WEBHOOK_SUCCEEDED, "pi_done"),
    )
    .await?;

    let err = payment_service::register_reference(
        &app.state,
        &user,
        PaymentIntentRequest {
            order_id: order.id,
            payment_reference: "pi_other".into(),
        },
    )
    .await
    .expect_err("already paid");
    assert!(matches!(err, AppError::InvalidState(_)));
    Ok(())
}

#[tokio::test]
async fn references_are_scoped_to_the_order_owner() {
    let app = TestApp::new();
    let owner = app.user(Role::User).await;
    let stranger = app.user(Role::User).await;
    let order = placed_order(&app, &owner).await;

    let err = payment_service::register_reference(
        &app.state,
        &stranger,
        PaymentIntentRequest {
            order_id: order.id,
            payment_reference: "pi_hijack".into(),
        },
    )
    .await
    .expect_err("not the owner");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn webhook_requires_the_shared_secret() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let order = with_reference(&app, &user, "pi_hook").await;

    let err = payment_service::handle_webhook(
        &app.state,
        Some("wrong"),
        event(WEBHOOK_SUCCEEDED, "pi_hook"),
    )
    .await
    .expect_err("bad secret");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err =
        payment_service::handle_webhook(&app.state, None, event(WEBHOOK_SUCCEEDED, "pi_hook"))
            .await
            .expect_err("missing secret");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let stored = app.store.find_order(order.id).await?.expect("order");
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn webhook_is_refused_when_no_secret_is_configured() {
    let mut app = TestApp::new();
    app.state = app.state.clone().with_webhook_secret(None);

    let err = payment_service::handle_webhook(
        &app.state,
        Some(WEBHOOK_SECRET),
        event(WEBHOOK_SUCCEEDED, "pi_any"),
    )
    .await
    .expect_err("no secret configured");
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn webhook_applies_success_and_failure() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let paid = with_reference(&app, &user, "pi_ok").await;
    let declined = with_reference(&app, &user, "pi_declined").await;

    let ack = payment_service::handle_webhook(
        &app.state,
        Some(WEBHOOK_SECRET),
        event(WEBHOOK_SUCCEEDED, "pi_ok"),
    )
    .await?;
    assert!(ack.data.expect("ack").received);

    payment_service::handle_webhook(
        &app.state,
        Some(WEBHOOK_SECRET),
        event(WEBHOOK_FAILED, "pi_declined"),
    )
    .await?;

    let paid = app.store.find_order(paid.id).await?.expect("order");
    let declined = app.store.find_order(declined.id).await?.expect("order");
    assert_eq!(paid.payment_status, PaymentStatus::Completed);
    assert_eq!(declined.payment_status, PaymentStatus::Failed);

    let kinds = app.notifier.kinds();
    assert!(kinds.contains(&"payment_completed"));
    assert!(kinds.contains(&"payment_failed"));
    Ok(())
}

#[tokio::test]
async fn webhook_acknowledges_unknown_events_and_references() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let order = with_reference(&app, &user, "pi_known").await;

    let ack = payment_service::handle_webhook(
        &app.state,
        Some(WEBHOOK_SECRET),
        event("charge.refunded", "pi_known"),
    )
    .await?;
    assert!(ack.data.expect("ack").received);

    let ack = payment_service::handle_webhook(
        &app.state,
        Some(WEBHOOK_SECRET),
        event(WEBHOOK_SUCCEEDED, "pi_unknown"),
    )
    .await?;
    assert!(ack.data.expect("ack").received);

    let stored = app.store.find_order(order.id).await?.expect("order");
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
    Ok(())
}
