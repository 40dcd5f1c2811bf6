use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use redis::aio::ConnectionManager;

use crate::errors::{AppError, AppResult};
use crate::metrics;
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::otp::{OtpPurpose, PendingRegistration};
use crate::models::user::{
    AuthResponse, LoginRequest, RegisterOtpRequest, User, UserProfile,
};
use crate::services::otp_ledger::OtpStore;

pub struct AuthService {
    mongo: Database,
    redis: ConnectionManager,
    jwt_service: JwtService,
    otp: Arc<dyn OtpStore>,
    session_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(
        mongo: Database,
        redis: ConnectionManager,
        jwt_service: JwtService,
        otp: Arc<dyn OtpStore>,
        session_ttl_seconds: i64,
    ) -> Self {
        Self {
            mongo,
            redis,
            jwt_service,
            otp,
            session_ttl_seconds,
        }
    }

    /// Hash a password using bcrypt with cost 12
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(hash(password, DEFAULT_COST)?)
    }

    /// Verify a password against a hash
    pub fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(verify(password, hash)?)
    }

    /// Start registration: store a pending record in the OTP ledger and
    /// return the code for delivery. Rejects emails that already have an
    /// account. The candidate password is hashed before it enters the
    /// ledger.
    pub async fn register_otp(&self, req: &RegisterOtpRequest) -> AppResult<String> {
        let users = self.mongo.collection::<User>("users");

        let existing = users.find_one(doc! { "email": &req.email }).await?;
        if existing.is_some() {
            return Err(AppError::conflict("An account with this email already exists"));
        }

        let password_hash = self.hash_password(&req.password)?;
        let pending = PendingRegistration {
            name: req.name.clone(),
            password_hash,
        };

        let code = self
            .otp
            .issue(&req.email, OtpPurpose::Registration, Some(pending))
            .await;

        metrics::OTP_ISSUED_TOTAL
            .with_label_values(&[OtpPurpose::Registration.as_str()])
            .inc();

        Ok(code)
    }

    /// Complete registration: consume the pending record, guard against a
    /// user created between issuance and verification, create the account
    /// and log it in.
    pub async fn verify_register_otp(&self, email: &str, code: &str) -> AppResult<AuthResponse> {
        let pending = self
            .consume_otp(email, code, OtpPurpose::Registration)
            .await?
            .ok_or_else(|| {
                AppError::upstream("Registration record is missing its pending payload")
            })?;

        let users = self.mongo.collection::<User>("users");

        // The email may have been registered while the code was pending
        let existing = users.find_one(doc! { "email": email }).await?;
        if existing.is_some() {
            return Err(AppError::conflict("An account with this email already exists"));
        }

        let now = Utc::now();
        let user = User {
            id: None, // MongoDB will generate
            email: email.to_string(),
            password_hash: pending.password_hash,
            name: pending.name,
            bookmarks: Vec::new(),
            completed: Vec::new(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let insert_result = users.insert_one(&user).await?;
        let user_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::upstream("Failed to get inserted user ID"))?;

        metrics::USERS_REGISTERED_TOTAL.inc();

        let token = self.generate_session_token(&user_id, &user.email)?;

        let mut user_with_id = user;
        user_with_id.id = Some(user_id);

        Ok(AuthResponse {
            token,
            user: UserProfile::from(user_with_id),
        })
    }

    /// Login with email and password. Unknown email and wrong password
    /// produce the same error so callers cannot probe for accounts.
    pub async fn login(&self, req: &LoginRequest) -> AppResult<AuthResponse> {
        let users = self.mongo.collection::<User>("users");

        let user = users
            .find_one(doc! { "email": &req.email })
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !self.verify_password(&req.password, &user.password_hash)? {
            tracing::warn!(email = %req.email, "Failed login attempt: invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let user_id = user
            .id
            .ok_or_else(|| AppError::upstream("User ID not found"))?;

        // Update last login timestamp
        users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "lastLoginAt": mongodb::bson::DateTime::now() } },
            )
            .await?;

        let token = self.generate_session_token(&user_id, &user.email)?;

        metrics::LOGINS_TOTAL.inc();
        tracing::info!(user_id = %user_id.to_hex(), email = %req.email, "Successful login");

        Ok(AuthResponse {
            token,
            user: UserProfile::from(user),
        })
    }

    /// Start the password-reset flow. Unlike login, this endpoint reports
    /// unknown emails, matching the client flow that directs users to
    /// register instead.
    pub async fn forgot_password(&self, email: &str) -> AppResult<(String, User)> {
        let users = self.mongo.collection::<User>("users");

        let user = users
            .find_one(doc! { "email": email })
            .await?
            .ok_or_else(|| AppError::not_found("No account found for this email"))?;

        let code = self.otp.issue(email, OtpPurpose::PasswordReset, None).await;

        metrics::OTP_ISSUED_TOTAL
            .with_label_values(&[OtpPurpose::PasswordReset.as_str()])
            .inc();

        Ok((code, user))
    }

    /// Exchange a valid reset code for a short-lived reset-authorization
    /// token. Does not log the user in.
    pub async fn verify_reset_otp(&self, email: &str, code: &str) -> AppResult<String> {
        self.consume_otp(email, code, OtpPurpose::PasswordReset)
            .await?;

        let users = self.mongo.collection::<User>("users");
        let user = users
            .find_one(doc! { "email": email })
            .await?
            .ok_or_else(|| AppError::not_found("No account found for this email"))?;

        let user_id = user
            .id
            .ok_or_else(|| AppError::upstream("User ID not found"))?;

        self.jwt_service.generate_reset_token(&user_id.to_hex())
    }

    /// Replace the password hash for the user named by a valid
    /// reset-authorization token.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let claims = self.jwt_service.validate_reset_token(token)?;

        let object_id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| AppError::InvalidToken("Invalid reset token".to_string()))?;

        let password_hash = self.hash_password(new_password)?;

        let users = self.mongo.collection::<User>("users");
        let result = users
            .update_one(
                doc! { "_id": object_id },
                doc! {
                    "$set": {
                        "password_hash": password_hash,
                        "updatedAt": mongodb::bson::DateTime::now()
                    }
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::not_found("User not found"));
        }

        tracing::info!(user_id = %claims.sub, "Password reset completed");
        Ok(())
    }

    /// Get user by ID
    pub async fn get_user_by_id(&self, user_id: &str) -> AppResult<User> {
        let object_id = ObjectId::parse_str(user_id)
            .map_err(|_| AppError::validation("Invalid user ID format"))?;

        let users = self.mongo.collection::<User>("users");
        users
            .find_one(doc! { "_id": object_id })
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    async fn consume_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> AppResult<Option<PendingRegistration>> {
        let result = self.otp.verify(email, code, purpose).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.code(),
        };
        metrics::OTP_VERIFICATIONS_TOTAL
            .with_label_values(&[purpose.as_str(), outcome])
            .inc();

        Ok(result?)
    }

    fn generate_session_token(&self, user_id: &ObjectId, email: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.session_ttl_seconds);

        let claims = JwtClaims {
            sub: user_id.to_hex(),
            email: email.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service.generate_token(claims)
    }

    /// Check if account is locked due to failed login attempts
    /// Returns true if locked (>= 5 failed attempts within TTL window)
    pub async fn check_failed_attempts(&self, email: &str) -> AppResult<bool> {
        let key = format!("failed_login:{}", email);
        let mut conn = self.redis.clone();

        let count: Option<u32> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::upstream(format!("Failed to query login attempts: {}", e)))?;

        Ok(count.unwrap_or(0) >= 5)
    }

    /// Increment failed login attempts counter
    /// Returns current count after increment
    /// Sets TTL to 15 minutes (900 seconds) on first failed attempt
    pub async fn increment_failed_attempts(&self, email: &str) -> AppResult<u32> {
        let key = format!("failed_login:{}", email);
        let mut conn = self.redis.clone();

        let count: u32 = redis::cmd("INCR")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                AppError::upstream(format!("Failed to increment login attempts: {}", e))
            })?;

        if count == 1 {
            redis::cmd("EXPIRE")
                .arg(&key)
                .arg(900) // 15 minutes in seconds
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| {
                    AppError::upstream(format!("Failed to set TTL on login attempts: {}", e))
                })?;
        }

        Ok(count)
    }

    /// Clear failed login attempts counter (called on successful login)
    pub async fn clear_failed_attempts(&self, email: &str) -> AppResult<()> {
        let key = format!("failed_login:{}", email);
        let mut conn = self.redis.clone();

        redis::cmd("DEL")
            .arg(&key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| AppError::upstream(format!("Failed to clear login attempts: {}", e)))?;

        Ok(())
    }
}
