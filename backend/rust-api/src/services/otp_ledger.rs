use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

use crate::models::otp::{OtpPurpose, OtpRecord, PendingRegistration};

/// Codes stay valid for 5 minutes from issuance.
const OTP_TTL_SECONDS: i64 = 300;

/// Once the map holds this many entries, `issue` drops expired records
/// before inserting. Abandoned flows otherwise accumulate until restart.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("No verification code is pending for this email")]
    NotFound,

    #[error("The verification code was issued for a different flow")]
    PurposeMismatch,

    #[error("The verification code has expired")]
    Expired,

    #[error("The verification code is incorrect")]
    CodeMismatch,
}

impl OtpError {
    pub fn code(&self) -> &'static str {
        match self {
            OtpError::NotFound => "OTP_NOT_FOUND",
            OtpError::PurposeMismatch => "OTP_PURPOSE_MISMATCH",
            OtpError::Expired => "OTP_EXPIRED",
            OtpError::CodeMismatch => "OTP_CODE_MISMATCH",
        }
    }
}

/// Store of pending one-time codes, keyed by email. One record per
/// email; re-issuing replaces the prior record.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Generate a 6-digit code and store it with a 5-minute expiry,
    /// overwriting any pending record for the email. Returns the code
    /// so the caller can deliver it.
    async fn issue(
        &self,
        email: &str,
        purpose: OtpPurpose,
        pending: Option<PendingRegistration>,
    ) -> String;

    /// Validate a code and consume the record on success (one-shot).
    /// A wrong code or purpose leaves the record in place; an expired
    /// record is evicted.
    async fn verify(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<PendingRegistration>, OtpError>;
}

/// Process-local ledger. All checks and the eviction on success happen
/// under one lock, so two concurrent verifications of the same code
/// cannot both succeed. The lock is never held across an await point.
pub struct MemoryOtpStore {
    entries: Mutex<HashMap<String, OtpRecord>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue_at(
        &self,
        now: DateTime<Utc>,
        email: &str,
        purpose: OtpPurpose,
        pending: Option<PendingRegistration>,
    ) -> String {
        let code = generate_code();
        let record = OtpRecord {
            code: code.clone(),
            expires_at: now + Duration::seconds(OTP_TTL_SECONDS),
            purpose,
            pending,
        };

        let mut entries = self.entries.lock().expect("otp ledger lock poisoned");
        if entries.len() >= SWEEP_THRESHOLD {
            entries.retain(|_, existing| existing.expires_at > now);
        }
        entries.insert(email.to_string(), record);

        code
    }

    pub fn verify_at(
        &self,
        now: DateTime<Utc>,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<PendingRegistration>, OtpError> {
        let mut entries = self.entries.lock().expect("otp ledger lock poisoned");

        let record = entries.get(email).ok_or(OtpError::NotFound)?;

        if record.purpose != purpose {
            return Err(OtpError::PurposeMismatch);
        }

        if now > record.expires_at {
            entries.remove(email);
            return Err(OtpError::Expired);
        }

        if record.code != code {
            return Err(OtpError::CodeMismatch);
        }

        match entries.remove(email) {
            Some(record) => Ok(record.pending),
            None => Err(OtpError::NotFound),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().expect("otp ledger lock poisoned").len()
    }
}

impl Default for MemoryOtpStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn issue(
        &self,
        email: &str,
        purpose: OtpPurpose,
        pending: Option<PendingRegistration>,
    ) -> String {
        self.issue_at(Utc::now(), email, purpose, pending)
    }

    async fn verify(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<PendingRegistration>, OtpError> {
        self.verify_at(Utc::now(), email, code, purpose)
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    format!("{:06}", rng.random_range(0..1_000_000))
}
