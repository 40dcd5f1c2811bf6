use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::AppError;
use crate::services::AppState;

/// Reset-authorization tokens are only good for 10 minutes.
const RESET_TOKEN_TTL_SECONDS: i64 = 600;
const RESET_TOKEN_PURPOSE: &str = "password-reset";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,   // user_id
    pub email: String, // user email
    pub exp: usize,    // expiration timestamp
    pub iat: usize,    // issued at timestamp
}

/// Claims for the short-lived token issued after a reset code verifies.
/// The purpose field keeps it from being accepted as a session token
/// and vice versa.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: String,
    pub purpose: String,
    pub exp: usize,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: JwtClaims) -> Result<String, AppError> {
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::upstream(format!("Failed to sign token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AppError> {
        let validation = Validation::default();

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                if e.to_string().contains("ExpiredSignature") {
                    AppError::InvalidToken("Token expired".to_string())
                } else {
                    AppError::InvalidToken("Invalid token".to_string())
                }
            })
    }

    pub fn generate_reset_token(&self, user_id: &str) -> Result<String, AppError> {
        let exp = chrono::Utc::now() + chrono::Duration::seconds(RESET_TOKEN_TTL_SECONDS);
        let claims = ResetClaims {
            sub: user_id.to_string(),
            purpose: RESET_TOKEN_PURPOSE.to_string(),
            exp: exp.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::upstream(format!("Failed to sign reset token: {}", e)))
    }

    /// Rejects expired tokens, session tokens, and anything else that was
    /// not minted by `generate_reset_token`.
    pub fn validate_reset_token(&self, token: &str) -> Result<ResetClaims, AppError> {
        let validation = Validation::default();

        let claims = decode::<ResetClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                if e.to_string().contains("ExpiredSignature") {
                    AppError::InvalidToken("Reset token expired".to_string())
                } else {
                    AppError::InvalidToken("Invalid reset token".to_string())
                }
            })?;

        if claims.purpose != RESET_TOKEN_PURPOSE {
            return Err(AppError::InvalidToken("Invalid reset token".to_string()));
        }

        Ok(claims)
    }
}

/// Middleware validating the Bearer session token
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extract token from Authorization header
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::InvalidToken("Missing authorization token".to_string()))?;

    // Validate token
    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let claims = jwt_service.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        e
    })?;

    tracing::debug!("Authenticated user: {}", claims.sub);

    // Store claims in request extensions for handlers to use
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
