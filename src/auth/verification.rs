//! Single-use email verification tokens.

use anyhow::anyhow;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use super::{
    error::{AuthError, MSG_TOKEN_USER_NOT_FOUND},
    models::VerificationToken,
    utils::{build_verify_url, expires_after, generate_token, hash_token, normalize_email},
};
use crate::{
    email::{EmailMessage, EmailSender},
    store::{ConsumeOutcome, VerificationTokenRepository},
};

#[derive(Clone)]
pub struct VerificationTokenIssuer {
    tokens: Arc<dyn VerificationTokenRepository>,
    sender: Arc<dyn EmailSender>,
    frontend_base_url: String,
    ttl_seconds: i64,
}

impl VerificationTokenIssuer {
    pub fn new(
        tokens: Arc<dyn VerificationTokenRepository>,
        sender: Arc<dyn EmailSender>,
        frontend_base_url: String,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            tokens,
            sender,
            frontend_base_url,
            ttl_seconds,
        }
    }

    /// Issue a fresh token for `email` and send the confirmation link.
    ///
    /// Any unconsumed token for the same email stops working.
    ///
    /// # Errors
    /// `EmailDelivery` when the transport rejects the message; the new token
    /// stays stored so a later resend can replace it.
    pub async fn issue(&self, email: &str) -> Result<VerificationToken, AuthError> {
        let email = normalize_email(email);
        let token = generate_token().map_err(AuthError::Internal)?;
        let expires_at = expires_after(Utc::now(), self.ttl_seconds).ok_or_else(|| {
            AuthError::Internal(anyhow!(
                "verification token lifetime out of range: {}s",
                self.ttl_seconds
            ))
        })?;

        self.tokens
            .replace_token(&email, &hash_token(&token), expires_at)
            .await?;

        let verify_url = build_verify_url(&self.frontend_base_url, &token);
        let message = EmailMessage::verification(&email, &verify_url);
        if let Err(err) = self.sender.send(&message) {
            error!("Failed to send verification email: {err}");
            return Err(AuthError::EmailDelivery(err));
        }

        info!(to_email = %email, "verification email sent");
        Ok(VerificationToken {
            token,
            email,
            expires_at,
        })
    }

    /// Consume `token`, mark its user verified and return the email.
    ///
    /// # Errors
    /// `InvalidOrExpired` for unknown, reused or expired tokens; `NotFound`
    /// when the email no longer belongs to a user.
    pub async fn consume(&self, token: &str) -> Result<String, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidOrExpired);
        }

        match self
            .tokens
            .consume_token(&hash_token(token), Utc::now())
            .await?
        {
            ConsumeOutcome::Verified(email) => Ok(email),
            ConsumeOutcome::Missing | ConsumeOutcome::Expired => Err(AuthError::InvalidOrExpired),
            ConsumeOutcome::UserMissing(_) => {
                Err(AuthError::NotFound(MSG_TOKEN_USER_NOT_FOUND.to_string()))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::models::{AuthMethod, UserRole};
    use crate::store::{MemoryStore, NewUser, UserRepository};
    use anyhow::{anyhow, Result};
    use std::sync::Mutex;

    /// Keeps every message so tests can pull the raw token back out.
    #[derive(Default)]
    pub(crate) struct RecordingEmailSender {
        messages: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    impl RecordingEmailSender {
        pub(crate) fn failing() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub(crate) fn sent(&self) -> Vec<EmailMessage> {
            self.messages.lock().unwrap().clone()
        }

        /// Token from the most recent link sent to `email`.
        pub(crate) fn last_token_for(&self, email: &str) -> Option<String> {
            self.sent()
                .into_iter()
                .rev()
                .find(|message| message.to_email == email)
                .and_then(|message| {
                    let payload: serde_json::Value =
                        serde_json::from_str(&message.payload_json).ok()?;
                    let url = payload["verify_url"].as_str()?.to_string();
                    url.split_once("token=").map(|(_, token)| token.to_string())
                })
        }
    }

    impl EmailSender for RecordingEmailSender {
        fn send(&self, message: &EmailMessage) -> Result<()> {
            if self.fail {
                return Err(anyhow!("smtp unavailable"));
            }
            self.messages.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn issuer(
        store: &Arc<MemoryStore>,
        sender: &Arc<RecordingEmailSender>,
        ttl: i64,
    ) -> VerificationTokenIssuer {
        VerificationTokenIssuer::new(
            store.clone(),
            sender.clone(),
            "https://app.example.com".to_string(),
            ttl,
        )
    }

    async fn seed_user(store: &MemoryStore, email: &str) -> Result<()> {
        store
            .insert_user(NewUser {
                email: email.to_string(),
                password_hash: None,
                display_name: "Ann".to_string(),
                avatar_url: None,
                method: AuthMethod::Credentials,
                role: UserRole::Regular,
                is_verified: false,
            })
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn issue_sends_link_with_raw_token() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingEmailSender::default());
        let issued = issuer(&store, &sender, 60).issue("A@x.com").await?;

        assert_eq!(issued.email, "a@x.com");
        assert_eq!(sender.last_token_for("a@x.com"), Some(issued.token.clone()));
        assert_eq!(store.pending_tokens_for("a@x.com").await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_token() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed_user(&store, "a@x.com").await?;
        let sender = Arc::new(RecordingEmailSender::default());
        let issuer = issuer(&store, &sender, 60);

        let first = issuer.issue("a@x.com").await?;
        let second = issuer.issue("a@x.com").await?;
        assert_eq!(store.pending_tokens_for("a@x.com").await, 1);

        let err = issuer.consume(&first.token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
        assert_eq!(issuer.consume(&second.token).await?, "a@x.com");
        Ok(())
    }

    #[tokio::test]
    async fn consume_is_single_use() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed_user(&store, "a@x.com").await?;
        let sender = Arc::new(RecordingEmailSender::default());
        let issuer = issuer(&store, &sender, 60);
        let issued = issuer.issue("a@x.com").await?;

        assert_eq!(issuer.consume(&issued.token).await?, "a@x.com");
        let err = issuer.consume(&issued.token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_is_rejected_and_user_stays_unverified() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed_user(&store, "a@x.com").await?;
        let sender = Arc::new(RecordingEmailSender::default());
        let issuer = issuer(&store, &sender, -1);
        let issued = issuer.issue("a@x.com").await?;

        let err = issuer.consume(&issued.token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
        let user = store.find_user_by_email("a@x.com").await?.unwrap();
        assert!(!user.is_verified);
        assert_eq!(store.pending_tokens_for("a@x.com").await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_internal_and_sends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingEmailSender::default());
        let err = issuer(&store, &sender, i64::MAX)
            .issue("a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
        assert!(sender.sent().is_empty());
        assert_eq!(store.pending_tokens_for("a@x.com").await, 0);
    }

    #[tokio::test]
    async fn unknown_and_blank_tokens_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingEmailSender::default());
        let issuer = issuer(&store, &sender, 60);
        assert!(matches!(
            issuer.consume("nope").await,
            Err(AuthError::InvalidOrExpired)
        ));
        assert!(matches!(
            issuer.consume("  ").await,
            Err(AuthError::InvalidOrExpired)
        ));
    }

    #[tokio::test]
    async fn token_for_vanished_user_is_not_found() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingEmailSender::default());
        let issuer = issuer(&store, &sender, 60);
        let issued = issuer.issue("ghost@x.com").await?;
        let err = issuer.consume(&issued.token).await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn delivery_failure_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingEmailSender::failing());
        let err = issuer(&store, &sender, 60)
            .issue("a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailDelivery(_)));
        assert!(!err.to_string().contains("smtp"));
    }
}
