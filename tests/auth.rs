use axum::{extract::FromRequestParts, http::Request};
use rental_commerce_api::{
    error::AppError, middleware::auth::AuthUser, models::Role,
    services::auth_service::issue_token,
};
use uuid::Uuid;

const SECRET: &str = "test-secret";

async fn extract(authorization: Option<&str>) -> Result<AuthUser, AppError> {
    let mut builder = Request::builder().uri("/api/orders");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    let (mut parts, _) = builder.body(()).expect("request").into_parts();
    AuthUser::from_request_parts(&mut parts, &()).await
}

// One test owns JWT_SECRET for this binary, so nothing races on the variable.
#[tokio::test]
async fn bearer_tokens_are_checked() {
    unsafe { std::env::set_var("JWT_SECRET", SECRET) };
    let user_id = Uuid::new_v4();

    let token = issue_token(user_id, Role::Admin, SECRET, chrono::Duration::hours(1))
        .expect("issue token");
    let user = extract(Some(&format!("Bearer {token}")))
        .await
        .expect("valid token");
    assert_eq!(user.user_id, user_id);
    assert!(user.is_admin());

    let err = extract(None).await.expect_err("missing header");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = extract(Some(&format!("Token {token}")))
        .await
        .expect_err("wrong scheme");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let forged = issue_token(user_id, Role::Admin, "other-secret", chrono::Duration::hours(1))
        .expect("issue token");
    let err = extract(Some(&format!("Bearer {forged}")))
        .await
        .expect_err("wrong signature");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let expired = issue_token(user_id, Role::User, SECRET, chrono::Duration::hours(-2))
        .expect("issue token");
    let err = extract(Some(&format!("Bearer {expired}")))
        .await
        .expect_err("expired");
    assert!(matches!(err, AppError::Unauthorized(_)));
}
