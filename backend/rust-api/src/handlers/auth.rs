use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    extractors::AppJson,
    middlewares::auth::{JwtClaims, JwtService},
    models::{
        otp::OtpPurpose,
        user::{
            ForgotPasswordRequest, LoginRequest, RegisterOtpRequest, ResetPasswordRequest,
            ResetTokenResponse, UserProfile, VerifyRegisterOtpRequest, VerifyResetOtpRequest,
        },
    },
    services::{auth_service::AuthService, email_service::EmailService, AppState},
};

fn auth_service(state: &AppState) -> AuthService {
    let jwt_service = JwtService::new(&state.config.jwt_secret);
    AuthService::new(
        state.mongo.clone(),
        state.redis.clone(),
        jwt_service,
        state.otp.clone(),
        state.config.session_ttl_seconds,
    )
}

/// POST /api/v1/auth/register-otp - Start registration, email a code
pub async fn register_otp(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterOtpRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {}", e)))?;

    tracing::info!("Registration code requested for: {}", req.email);

    let service = auth_service(&state);
    let code = service.register_otp(&req).await?;

    let email_service = EmailService::new(state.config.smtp.clone());
    email_service
        .send_otp_email(&req.email, &req.name, &code, OtpPurpose::Registration)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Verification code sent" })),
    ))
}

/// POST /api/v1/auth/verify-register-otp - Complete registration
pub async fn verify_register_otp(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<VerifyRegisterOtpRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {}", e)))?;

    let service = auth_service(&state);

    match service.verify_register_otp(&req.email, &req.otp).await {
        Ok(response) => {
            tracing::info!("User registered successfully: {}", req.email);
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(e) => {
            tracing::warn!("Registration verification failed for {}: {}", req.email, e);
            Err(e)
        }
    }
}

/// POST /api/v1/auth/login - Login with email and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {}", e)))?;

    tracing::info!("Login attempt for user: {}", req.email);

    let service = auth_service(&state);

    // Check if account is locked due to failed login attempts
    let is_locked = service
        .check_failed_attempts(&req.email)
        .await
        .unwrap_or(false); // Default to unlocked if Redis check fails

    if is_locked {
        tracing::warn!("Login blocked for {}: too many failed attempts", req.email);
        return Err(AppError::AccountLocked);
    }

    match service.login(&req).await {
        Ok(response) => {
            // Clear failed login attempts on successful login
            let _ = service.clear_failed_attempts(&req.email).await;
            Ok((StatusCode::OK, Json(response)))
        }
        Err(e) => {
            // Increment failed login attempts counter
            let count = service
                .increment_failed_attempts(&req.email)
                .await
                .unwrap_or(0);
            tracing::warn!("Failed login attempts for {}: {}/5", req.email, count);
            Err(e)
        }
    }
}

/// POST /api/v1/auth/forgot-password - Start password reset, email a code
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {}", e)))?;

    tracing::info!("Password reset code requested for: {}", req.email);

    let service = auth_service(&state);
    let (code, user) = service.forgot_password(&req.email).await?;

    let email_service = EmailService::new(state.config.smtp.clone());
    email_service
        .send_otp_email(&req.email, &user.name, &code, OtpPurpose::PasswordReset)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Password reset code sent" })),
    ))
}

/// POST /api/v1/auth/verify-otp - Exchange a reset code for a reset token
pub async fn verify_reset_otp(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<VerifyResetOtpRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {}", e)))?;

    let service = auth_service(&state);
    let token = service.verify_reset_otp(&req.email, &req.otp).await?;

    Ok((StatusCode::OK, Json(ResetTokenResponse { token })))
}

/// POST /api/v1/auth/reset-password - Set a new password with a reset token
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {}", e)))?;

    let service = auth_service(&state);
    service.reset_password(&req.token, &req.new_password).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Password has been reset" })),
    ))
}

/// GET /api/v1/auth/me - Get current user profile (protected)
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    tracing::debug!("Getting current user profile for user_id: {}", claims.sub);

    let service = auth_service(&state);
    let user = service.get_user_by_id(&claims.sub).await?;

    Ok((StatusCode::OK, Json(UserProfile::from(user))))
}
