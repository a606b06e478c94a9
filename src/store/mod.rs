//! Persistence boundary for the auth engine.
//!
//! Each repository trait covers one record family (users, provider accounts,
//! verification tokens, sessions). `PgStore` backs all of them with Postgres;
//! `MemoryStore` keeps everything behind one lock for tests and local runs.
//!
//! Uniqueness (email, `(provider, external_id)`, one token per email) is the
//! store's job. Violations surface as [`StoreError::UniqueViolation`], tagged
//! with the [`UniqueKey`] that collided, so callers can treat them as a conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::models::{Account, AuthMethod, NewAccount, SessionRecord, User, UserRole};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Which uniqueness rule a write broke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniqueKey {
    Email,
    /// `(provider, external_id)` on accounts.
    ProviderAccount,
    Other,
}

impl UniqueKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::ProviderAccount => "provider account",
            Self::Other => "key",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {}", .0.as_str())]
    UniqueViolation(UniqueKey),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Row data for a user insert. The password is already hashed.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub method: AuthMethod,
    pub role: UserRole,
    pub is_verified: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Clone, Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_two_factor_enabled: Option<bool>,
}

impl UserChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.display_name.is_none() && self.is_two_factor_enabled.is_none()
    }
}

/// Result of consuming a verification token in one atomic step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Token was valid; the user with this email is now verified.
    Verified(String),
    /// No token row matches the hash (never issued or already consumed).
    Missing,
    /// Token existed but was past its expiry; the row has been removed.
    Expired,
    /// Token was valid but no user owns its email anymore.
    UserMissing(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update_user(&self, id: Uuid, changes: UserChanges)
        -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_account(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Account>, StoreError>;
    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError>;
    /// Point an existing account at another user. `None` when the account is gone.
    async fn relink_account(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Account>, StoreError>;
    async fn accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>, StoreError>;
}

#[async_trait]
pub trait VerificationTokenRepository: Send + Sync {
    /// Store a token hash for `email`, dropping any unconsumed token for the same email.
    async fn replace_token(
        &self,
        email: &str,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Consume the token: delete it and mark its user verified, atomically.
    async fn consume_token(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: SessionRecord) -> Result<(), StoreError>;
    /// Returns `false` when no session row matched.
    async fn delete_session(&self, session_hash: &[u8]) -> Result<bool, StoreError>;
    /// Only unexpired sessions are returned.
    async fn lookup_session(
        &self,
        session_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Everything the auth engine needs from a backing store.
pub trait AuthStore:
    UserRepository
    + AccountRepository
    + VerificationTokenRepository
    + SessionRepository
    + StoreHealth
    + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository
        + AccountRepository
        + VerificationTokenRepository
        + SessionRepository
        + StoreHealth
        + 'static
{
}
