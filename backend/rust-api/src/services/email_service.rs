use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::errors::{AppError, AppResult};
use crate::models::otp::OtpPurpose;

pub struct EmailService {
    smtp: SmtpConfig,
}

impl EmailService {
    pub fn new(smtp: SmtpConfig) -> Self {
        Self { smtp }
    }

    pub fn sending_disabled() -> bool {
        std::env::var("EMAIL_SEND_DISABLED")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Deliver a one-time code. One message per issuance, no retries: a
    /// transport failure surfaces to the caller as an upstream error.
    pub async fn send_otp_email(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> AppResult<()> {
        if Self::sending_disabled() {
            tracing::info!(email = %recipient_email, purpose = purpose.as_str(), "Email sending disabled, skipping OTP delivery");
            return Ok(());
        }

        let from_address: Mailbox =
            format!("{} <{}>", self.smtp.from_name, self.smtp.from_email)
                .parse()
                .map_err(|e| AppError::upstream(format!("Invalid from email address: {}", e)))?;
        let to_address: Mailbox = format!("{} <{}>", recipient_name, recipient_email)
            .parse()
            .map_err(|e| AppError::upstream(format!("Invalid recipient email address: {}", e)))?;

        let (subject, body) = match purpose {
            OtpPurpose::Registration => (
                "Verify your CodePlatter account",
                format!(
                    "Hi {}!\n\nYour CodePlatter verification code is: {}\n\nThe code is valid for 5 minutes. If you did not request an account, you can ignore this email.\n",
                    recipient_name, code
                ),
            ),
            OtpPurpose::PasswordReset => (
                "Reset your CodePlatter password",
                format!(
                    "Hi {}!\n\nYour CodePlatter password reset code is: {}\n\nThe code is valid for 5 minutes. If you did not request a reset, you can ignore this email.\n",
                    recipient_name, code
                ),
            ),
        };

        let email = Message::builder()
            .from(from_address)
            .to(to_address)
            .subject(subject)
            .body(body)
            .map_err(|e| AppError::upstream(format!("Failed to build email message: {}", e)))?;

        let mailer = self.build_mailer()?;
        mailer
            .send(email)
            .await
            .map_err(|e| AppError::upstream(format!("Failed to send OTP email: {}", e)))?;

        Ok(())
    }

    fn build_mailer(&self) -> AppResult<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(self.smtp.login.clone(), self.smtp.password.clone());

        let builder = if self.smtp.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.smtp.server)
                .map_err(|e| AppError::upstream(format!("Invalid SMTP server for TLS: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.smtp.server)
        }
        .port(self.smtp.port)
        .credentials(creds);

        Ok(builder.build())
    }
}
