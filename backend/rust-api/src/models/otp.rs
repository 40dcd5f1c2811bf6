use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flow a one-time code was issued for. A code issued for one flow is
/// never accepted by the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtpPurpose {
    #[serde(rename = "registration")]
    Registration,
    #[serde(rename = "password-reset")]
    PasswordReset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Registration => "registration",
            OtpPurpose::PasswordReset => "password-reset",
        }
    }
}

/// Registration data held in memory between code issuance and
/// verification. The password is hashed before it enters the ledger, so
/// plaintext credentials never sit in the pending map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    pub name: String,
    pub password_hash: String,
}

/// One pending code per email. A re-issue replaces the prior record.
#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub purpose: OtpPurpose,
    pub pending: Option<PendingRegistration>,
}
