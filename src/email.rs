//! Outbound email abstraction.
//!
//! The auth engine hands each verification message to an [`EmailSender`] and
//! surfaces a failed send to its caller. Real transports (SMTP, provider APIs)
//! implement the trait; `LogEmailSender` is the default and only logs.

use anyhow::Result;
use serde_json::json;
use tracing::info;

pub const TEMPLATE_VERIFY_EMAIL: &str = "verify_email";

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

impl EmailMessage {
    /// Message carrying the confirmation link for `to_email`.
    #[must_use]
    pub fn verification(to_email: &str, verify_url: &str) -> Self {
        let payload = json!({
            "email": to_email,
            "verify_url": verify_url,
        });
        Self {
            to_email: to_email.to_string(),
            template: TEMPLATE_VERIFY_EMAIL.to_string(),
            payload_json: payload.to_string(),
        }
    }
}

pub trait EmailSender: Send + Sync {
    /// Deliver a message or report why it could not be sent.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Sender that logs the payload instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}
