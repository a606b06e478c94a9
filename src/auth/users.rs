//! Canonical user records: lookup, creation and partial updates.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{
    error::{AuthError, MSG_USER_NOT_FOUND},
    models::{AuthMethod, User, UserRole},
    password::PasswordHasher,
    utils::normalize_email,
};
use crate::store::{AccountRepository, NewUser, UserChanges, UserRepository};

/// Parameters for [`UserDirectory::create`].
pub struct CreateUser {
    pub email: String,
    /// Plain secret; empty for provider-sourced users.
    pub password: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub method: AuthMethod,
    pub is_verified: bool,
}

impl std::fmt::Debug for CreateUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateUser")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .field("method", &self.method)
            .field("is_verified", &self.is_verified)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
    accounts: Arc<dyn AccountRepository>,
    hasher: PasswordHasher,
}

impl UserDirectory {
    pub fn new(
        users: Arc<dyn UserRepository>,
        accounts: Arc<dyn AccountRepository>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            accounts,
            hasher,
        }
    }

    #[must_use]
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// # Errors
    /// `NotFound` when the id does not resolve.
    pub async fn find_by_id(&self, id: Uuid) -> Result<User, AuthError> {
        let user = self
            .users
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(MSG_USER_NOT_FOUND.to_string()))?;
        self.with_accounts(user).await
    }

    /// Absent users are `Ok(None)`; callers use this to detect unused emails.
    ///
    /// # Errors
    /// Only store failures.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let email = normalize_email(email);
        match self.users.find_user_by_email(&email).await? {
            Some(user) => Ok(Some(self.with_accounts(user).await?)),
            None => Ok(None),
        }
    }

    /// Persist a new user. Only credential users with a non-empty password get a hash.
    ///
    /// # Errors
    /// `Conflict` when the email is already taken.
    pub async fn create(&self, params: CreateUser) -> Result<User, AuthError> {
        let password_hash =
            if params.method == AuthMethod::Credentials && !params.password.is_empty() {
                Some(self.hasher.hash(&params.password)?)
            } else {
                None
            };

        let user = self
            .users
            .insert_user(NewUser {
                email: normalize_email(&params.email),
                password_hash,
                display_name: params.display_name,
                avatar_url: params.avatar_url,
                method: params.method,
                role: UserRole::Regular,
                is_verified: params.is_verified,
            })
            .await?;

        debug!(user_id = %user.id, method = %user.method, "user created");
        Ok(user)
    }

    /// # Errors
    /// `NotFound` for an unknown id, `Conflict` when a new email is taken.
    pub async fn update(&self, id: Uuid, mut changes: UserChanges) -> Result<User, AuthError> {
        changes.email = changes.email.as_deref().map(normalize_email);
        let user = self
            .users
            .update_user(id, changes)
            .await?
            .ok_or_else(|| AuthError::NotFound(MSG_USER_NOT_FOUND.to_string()))?;
        self.with_accounts(user).await
    }

    async fn with_accounts(&self, mut user: User) -> Result<User, AuthError> {
        user.accounts = self.accounts.accounts_for_user(user.id).await?;
        Ok(user)
    }
}
