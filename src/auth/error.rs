//! Error taxonomy for the auth engine.
//!
//! Every message is safe to show to an end user: no hashes, tokens or
//! internal identifiers ever end up in the display text.

use thiserror::Error;

use crate::store::{StoreError, UniqueKey};

pub const MSG_EMAIL_TAKEN: &str =
    "Registration failed. A user with this email already exists. Use another email or sign in.";
pub const MSG_ACCOUNT_LINKED: &str =
    "This provider account is already linked to another user.";
pub const MSG_CONFLICT: &str = "The request conflicts with existing data. Please try again.";
pub const MSG_USER_NOT_FOUND: &str = "User not found. Please check the entered data.";
pub const MSG_INVALID_PASSWORD: &str =
    "Invalid password. Please try again or restore your password if you forgot it.";
pub const MSG_EMAIL_NOT_VERIFIED: &str =
    "Your email is not verified. Please check your inbox for a confirmation link.";
pub const MSG_SESSION_SAVE: &str =
    "Could not save the session. Check that the session settings are configured correctly.";
pub const MSG_SESSION_DESTROY: &str =
    "Could not end the session. The server may be unavailable or the session already ended.";
pub const MSG_TOKEN_USER_NOT_FOUND: &str = "No user is registered for this confirmation token.";
pub const MSG_PROVIDER_NOT_FOUND: &str =
    "Provider not found. Please check that the provider name is correct.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    SessionPersist(String),
    #[error("{0}")]
    ExternalProvider(String),
    #[error("The confirmation token is invalid or has expired. Please request a new one.")]
    InvalidOrExpired,
    #[error("The verification email could not be sent. Please try again later.")]
    EmailDelivery(#[source] anyhow::Error),
    #[error("Internal error. Please try again later.")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(key) => Self::Conflict(
                match key {
                    UniqueKey::Email => MSG_EMAIL_TAKEN,
                    UniqueKey::ProviderAccount => MSG_ACCOUNT_LINKED,
                    UniqueKey::Other => MSG_CONFLICT,
                }
                .to_string(),
            ),
            StoreError::Backend(err) => Self::Internal(err),
        }
    }
}
