//! Server-side sessions bound to a client-held opaque token.
//!
//! The client carries the raw token (cookie or bearer header); the store only
//! sees its SHA-256 hash. Saving always issues a fresh token so a token handed
//! out before login can never become an authenticated one.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use super::{
    error::{AuthError, MSG_SESSION_DESTROY, MSG_SESSION_SAVE},
    models::{SessionRecord, User},
    utils::{expires_after, generate_token, hash_token},
};
use crate::store::SessionRepository;

/// Per-request view of the client's session carrier.
///
/// Built from the incoming cookie/header; after a save or destroy the caller
/// reads [`SessionHandle::token`] back to decide which cookie to emit.
#[derive(Clone, Default)]
pub struct SessionHandle {
    token: Option<String>,
}

impl SessionHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_token(token: Option<String>) -> Self {
        Self {
            token: token.filter(|token| !token.is_empty()),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionRepository>,
    ttl_seconds: i64,
}

impl SessionManager {
    pub fn new(sessions: Arc<dyn SessionRepository>, ttl_seconds: i64) -> Self {
        Self {
            sessions,
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Bind the client session to `user` and persist it.
    ///
    /// The new session is written under a fresh token before the one the
    /// handle already carried is deleted. If the write fails the handle and
    /// its previous session are left untouched.
    ///
    /// # Errors
    /// `SessionPersist` when the store write fails.
    pub async fn save_session(
        &self,
        handle: &mut SessionHandle,
        user: User,
    ) -> Result<User, AuthError> {
        let token = generate_token().map_err(|err| {
            error!("Failed to generate session token: {err}");
            AuthError::SessionPersist(MSG_SESSION_SAVE.to_string())
        })?;

        let now = Utc::now();
        let Some(expires_at) = expires_after(now, self.ttl_seconds) else {
            error!(ttl_seconds = self.ttl_seconds, "Session lifetime out of range");
            return Err(AuthError::SessionPersist(MSG_SESSION_SAVE.to_string()));
        };
        let record = SessionRecord {
            session_hash: hash_token(&token),
            user_id: user.id,
            created_at: now,
            last_saved: now,
            expires_at,
        };

        if let Err(err) = self.sessions.insert_session(record).await {
            error!("Failed to save session: {err}");
            return Err(AuthError::SessionPersist(MSG_SESSION_SAVE.to_string()));
        }

        if let Some(previous) = handle.token.replace(token) {
            if let Err(err) = self.sessions.delete_session(&hash_token(&previous)).await {
                warn!("Failed to delete previous session: {err}");
            }
        }
        Ok(user)
    }

    /// Invalidate the client session. On success the handle is emptied and the
    /// caller must clear the cookie.
    ///
    /// # Errors
    /// `SessionPersist` when there is no session, it was already gone, or the
    /// store is unreachable.
    pub async fn destroy_session(&self, handle: &mut SessionHandle) -> Result<(), AuthError> {
        let Some(token) = handle.token.as_deref() else {
            return Err(AuthError::SessionPersist(MSG_SESSION_DESTROY.to_string()));
        };

        match self.sessions.delete_session(&hash_token(token)).await {
            Ok(true) => {
                handle.token = None;
                Ok(())
            }
            Ok(false) => Err(AuthError::SessionPersist(MSG_SESSION_DESTROY.to_string())),
            Err(err) => {
                error!("Failed to delete session: {err}");
                Err(AuthError::SessionPersist(MSG_SESSION_DESTROY.to_string()))
            }
        }
    }

    /// Resolve the handle to its user id. Missing or expired sessions are `Ok(None)`.
    ///
    /// # Errors
    /// Only store failures.
    pub async fn current_user_id(&self, handle: &SessionHandle) -> Result<Option<Uuid>, AuthError> {
        let Some(token) = handle.token() else {
            return Ok(None);
        };
        let record = self
            .sessions
            .lookup_session(&hash_token(token), Utc::now())
            .await?;
        Ok(record.map(|session| session.user_id))
    }
}
