//! Identity, account, session and verification records.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account type stored for every provider link.
pub const ACCOUNT_TYPE_OAUTH: &str = "oauth";

/// How a user first established their identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    Credentials,
    Google,
    Yandex,
}

impl AuthMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::Google => "google",
            Self::Yandex => "yandex",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "credentials" => Ok(Self::Credentials),
            "google" => Ok(Self::Google),
            "yandex" => Ok(Self::Yandex),
            other => Err(format!("unknown auth method: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UserRole {
    #[default]
    Regular,
    Admin,
}

impl UserRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "regular" => Ok(Self::Regular),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown user role: {other}")),
        }
    }
}

/// Canonical identity record.
///
/// `password_hash` is only ever set for `AuthMethod::Credentials` users; provider
/// sign-ups carry no local credential.
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub method: AuthMethod,
    pub is_verified: bool,
    pub is_two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
}

impl User {
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password_hash
            .as_deref()
            .is_some_and(|hash| !hash.is_empty())
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "***"))
            .field("display_name", &self.display_name)
            .field("avatar_url", &self.avatar_url)
            .field("role", &self.role)
            .field("method", &self.method)
            .field("is_verified", &self.is_verified)
            .field("is_two_factor_enabled", &self.is_two_factor_enabled)
            .field("accounts", &self.accounts)
            .finish_non_exhaustive()
    }
}

/// Link between a user and one external provider identity.
#[derive(Clone)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub provider: String,
    pub external_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("kind", &self.kind)
            .field("provider", &self.provider)
            .field("external_id", &self.external_id)
            .field("access_token", &"***")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Data required to insert an `Account`.
#[derive(Clone)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub provider: String,
    pub external_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Server-held session row. Only the hash of the cookie value is kept.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub session_hash: Vec<u8>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_saved: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly issued email verification token.
///
/// `token` is the raw value delivered to the user; the store only sees its hash.
#[derive(Clone)]
pub struct VerificationToken {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationToken")
            .field("token", &"***")
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
