use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::TestApp;

async fn post_json(
    app: &TestApp,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

    (status, value)
}

/// Drive the full OTP registration flow with a planted code.
/// Returns the session token.
async fn register_user(app: &TestApp, email: &str, password: &str, name: &str) -> String {
    let (status, _) = post_json(
        app,
        "/api/v1/auth/register-otp",
        json!({ "name": name, "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Replace the emailed code with one the test knows
    let code = common::plant_registration_code(app, email, name, password);

    let (status, body) = post_json(
        app,
        "/api/v1/auth/verify-register-otp",
        json!({ "email": email, "otp": code }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    body["token"].as_str().expect("token missing").to_string()
}

async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, serde_json::Value) {
    post_json(
        app,
        "/api/v1/auth/login",
        json!({ "email": email, "password": password }),
    )
    .await
}

fn unique_email(prefix: &str) -> String {
    format!(
        "{}-{}@example.com",
        prefix,
        mongodb::bson::oid::ObjectId::new().to_hex()
    )
}

#[tokio::test]
async fn test_register_otp_sends_code() {
    let app = common::create_test_app().await;

    let email = unique_email("register-otp");
    let (status, body) = post_json(
        &app,
        "/api/v1/auth/register-otp",
        json!({ "name": "Test User", "email": email, "password": "SecurePassword123!" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Verification code sent");
}

#[tokio::test]
async fn test_register_flow_creates_account_and_logs_in() {
    let app = common::create_test_app().await;

    let email = unique_email("register-full");
    let token = register_user(&app, &email, "SecurePassword123!", "Ada L").await;
    assert!(!token.is_empty());

    // The session token works against /me
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let profile: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(profile["email"], email);
    assert_eq!(profile["name"], "Ada L");

    // And a fresh login succeeds
    let (status, body) = login(&app, &email, "SecurePassword123!").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["email"], email);
}

#[tokio::test]
async fn test_register_otp_rejects_existing_email() {
    let app = common::create_test_app().await;

    let email = unique_email("register-dup");
    register_user(&app, &email, "SecurePassword123!", "First").await;

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/register-otp",
        json!({ "name": "Second", "email": email, "password": "OtherPassword123!" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_otp_invalid_email() {
    let app = common::create_test_app().await;

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/register-otp",
        json!({ "name": "Test", "email": "not-an-email", "password": "SecurePassword123!" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_verify_register_otp_wrong_code_allows_retry() {
    let app = common::create_test_app().await;

    let email = unique_email("wrong-code");
    let code = common::plant_registration_code(&app, &email, "Retry User", "SecurePassword123!");
    let wrong = if code == "000000" { "000001" } else { "000000" };

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/verify-register-otp",
        json!({ "email": email, "otp": wrong }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OTP_CODE_MISMATCH");

    // The record survives a mismatch, so the right code still verifies
    let (status, _) = post_json(
        &app,
        "/api/v1/auth/verify-register-otp",
        json!({ "email": email, "otp": code }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_verify_register_otp_unknown_email() {
    let app = common::create_test_app().await;

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/verify-register-otp",
        json!({ "email": unique_email("nobody"), "otp": "123456" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OTP_NOT_FOUND");
}

#[tokio::test]
async fn test_verified_code_cannot_be_replayed() {
    let app = common::create_test_app().await;

    let email = unique_email("replay");
    let code = common::plant_registration_code(&app, &email, "Replay", "SecurePassword123!");

    let (status, _) = post_json(
        &app,
        "/api/v1/auth/verify-register-otp",
        json!({ "email": email, "otp": code }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/verify-register-otp",
        json!({ "email": email, "otp": code }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OTP_NOT_FOUND");
}

#[tokio::test]
async fn test_register_verification_conflicts_with_race_created_user() {
    let app = common::create_test_app().await;

    let email = unique_email("race");
    let code = common::plant_registration_code(&app, &email, "Late", "SecurePassword123!");

    // Another registration for the same email completes first
    let now = mongodb::bson::DateTime::now();
    app.mongo
        .collection::<mongodb::bson::Document>("users")
        .insert_one(mongodb::bson::doc! {
            "email": &email,
            "password_hash": bcrypt::hash("OtherPassword123!", common::TEST_BCRYPT_COST).unwrap(),
            "name": "Early",
            "bookmarks": [],
            "completed": [],
            "createdAt": now,
            "updatedAt": now,
        })
        .await
        .unwrap();

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/verify-register-otp",
        json!({ "email": email, "otp": code }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = common::create_test_app().await;

    let email = unique_email("wrong-pwd");
    register_user(&app, &email, "CorrectPassword123!", "Wrong Pwd").await;

    let (status, body) = login(&app, &email, "WrongPassword123!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_login_unknown_email_uses_same_error() {
    let app = common::create_test_app().await;

    // Unknown email and bad password are indistinguishable
    let (status, body) = login(&app, &unique_email("ghost"), "SomePassword123!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_INVALID_CREDENTIALS");
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_failed_login_lockout() {
    let app = common::create_test_app().await;

    let email = unique_email("lockout");
    register_user(&app, &email, "CorrectPassword123!", "Lockout").await;

    for i in 0..5 {
        let (status, _) = login(&app, &email, &format!("WrongPassword{}", i)).await;
        assert_eq!(
            status,
            StatusCode::UNAUTHORIZED,
            "Failed login #{} should return 401",
            i + 1
        );
    }

    let (status, body) = login(&app, &email, "WrongPassword6").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "ACCOUNT_LOCKED");
}

#[tokio::test]
async fn test_forgot_password_unknown_email() {
    let app = common::create_test_app().await;

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/forgot-password",
        json!({ "email": unique_email("ghost") }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = common::create_test_app().await;

    let email = unique_email("reset");
    register_user(&app, &email, "OriginalPassword123!", "Reset User").await;

    let (status, _) = post_json(
        &app,
        "/api/v1/auth/forgot-password",
        json!({ "email": email }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Swap in a code the test knows
    let code = common::plant_reset_code(&app, &email);

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/verify-otp",
        json!({ "email": email, "otp": code }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = body["token"].as_str().expect("reset token missing");

    let (status, _) = post_json(
        &app,
        "/api/v1/auth/reset-password",
        json!({ "token": reset_token, "newPassword": "BrandNewPassword123!" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Old password no longer works, new one does
    let (status, _) = login(&app, &email, "OriginalPassword123!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = login(&app, &email, "BrandNewPassword123!").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_purpose_mismatch_keeps_record_usable() {
    let app = common::create_test_app().await;

    let email = unique_email("purpose");
    register_user(&app, &email, "SecurePassword123!", "Purpose").await;

    let code = common::plant_reset_code(&app, &email);

    // A reset code is refused by the registration verifier
    let (status, body) = post_json(
        &app,
        "/api/v1/auth/verify-register-otp",
        json!({ "email": email, "otp": code }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OTP_PURPOSE_MISMATCH");

    // The mismatch did not consume it; the reset verifier accepts it
    let (status, _) = post_json(
        &app,
        "/api/v1/auth/verify-otp",
        json!({ "email": email, "otp": code }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reset_password_rejects_session_token() {
    let app = common::create_test_app().await;

    let email = unique_email("session-not-reset");
    let session_token = register_user(&app, &email, "SecurePassword123!", "Session").await;

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/reset-password",
        json!({ "token": session_token, "newPassword": "AnotherPassword123!" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
