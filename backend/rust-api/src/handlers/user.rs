use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    extractors::AppJson,
    middlewares::auth::{JwtClaims, JwtService},
    models::user::{ChangePasswordRequest, UpdateProfileRequest, UserProfile},
    services::{auth_service::AuthService, user_service::UserService, AppState},
};

#[derive(Debug, Deserialize)]
pub struct ToggleQuestionRequest {
    #[serde(rename = "questionId")]
    pub question_id: String,
}

/// POST /api/v1/user/bookmarks - Toggle a bookmark
pub async fn toggle_bookmark(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ToggleQuestionRequest>,
) -> AppResult<impl IntoResponse> {
    let service = UserService::new(state.mongo.clone());
    let bookmarked = service
        .toggle_bookmark(&claims.sub, &req.question_id)
        .await?;

    tracing::debug!(
        user_id = %claims.sub,
        question_id = %req.question_id,
        bookmarked,
        "Bookmark toggled"
    );

    Ok((
        StatusCode::OK,
        Json(json!({ "questionId": req.question_id, "bookmarked": bookmarked })),
    ))
}

/// GET /api/v1/user/bookmarks - List bookmarked questions
pub async fn list_bookmarks(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let service = UserService::new(state.mongo.clone());
    let questions = service.list_bookmarks(&claims.sub).await?;

    Ok((StatusCode::OK, Json(json!({ "questions": questions }))))
}

/// POST /api/v1/user/progress - Toggle question completion
pub async fn toggle_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ToggleQuestionRequest>,
) -> AppResult<impl IntoResponse> {
    let service = UserService::new(state.mongo.clone());
    let completed = service
        .toggle_progress(&claims.sub, &req.question_id)
        .await?;

    tracing::debug!(
        user_id = %claims.sub,
        question_id = %req.question_id,
        completed,
        "Progress toggled"
    );

    Ok((
        StatusCode::OK,
        Json(json!({ "questionId": req.question_id, "completed": completed })),
    ))
}

/// GET /api/v1/user/progress - List completed questions
pub async fn list_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let service = UserService::new(state.mongo.clone());
    let questions = service.list_progress(&claims.sub).await?;

    Ok((StatusCode::OK, Json(json!({ "questions": questions }))))
}

/// PATCH /api/v1/user/profile - Update display name
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {}", e)))?;

    tracing::info!("Updating profile for user_id: {}", claims.sub);

    let service = UserService::new(state.mongo.clone());
    let user = service.update_profile(&claims.sub, &req.name).await?;

    Ok((StatusCode::OK, Json(UserProfile::from(user))))
}

/// POST /api/v1/user/password - Change password (requires old password)
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {}", e)))?;

    tracing::info!("Changing password for user_id: {}", claims.sub);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(
        state.mongo.clone(),
        state.redis.clone(),
        jwt_service,
        state.otp.clone(),
        state.config.session_ttl_seconds,
    );

    let user = service.get_user_by_id(&claims.sub).await?;

    if !service.verify_password(&req.old_password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    let new_password_hash = service.hash_password(&req.new_password)?;

    use mongodb::bson::{doc, oid::ObjectId};
    let user_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| AppError::validation("Invalid user ID format"))?;

    let users = state.mongo.collection::<mongodb::bson::Document>("users");
    users
        .update_one(
            doc! { "_id": user_id },
            doc! {
                "$set": {
                    "password_hash": new_password_hash,
                    "updatedAt": mongodb::bson::DateTime::now()
                }
            },
        )
        .await?;

    tracing::info!("Password changed successfully for user_id: {}", claims.sub);

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Password changed successfully" })),
    ))
}
