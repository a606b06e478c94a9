//! Maps an external provider identity onto an internal user.

use std::sync::Arc;
use tracing::{info, warn};

use super::{
    error::AuthError,
    models::{NewAccount, User},
    users::{CreateUser, UserDirectory},
};
use crate::{oauth::UserInfo, store::AccountRepository};

#[derive(Clone)]
pub struct AccountLinker {
    users: UserDirectory,
    accounts: Arc<dyn AccountRepository>,
}

impl AccountLinker {
    pub fn new(users: UserDirectory, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { users, accounts }
    }

    /// Return the user owning `(provider, profile.id)`, creating one if needed.
    ///
    /// A linked account whose user vanished falls through to creating a fresh
    /// verified user, and the account row is moved over to it. Users are never
    /// matched by email, so a profile whose email is already registered fails
    /// with `Conflict`.
    ///
    /// # Errors
    /// `Conflict` on email or account uniqueness violations, `Internal` on store failures.
    pub async fn link_or_create(&self, profile: UserInfo) -> Result<User, AuthError> {
        let provider = profile.provider.as_str();
        let existing = self.accounts.find_account(provider, &profile.id).await?;

        if let Some(account) = &existing {
            match self.users.find_by_id(account.user_id).await {
                Ok(user) => return Ok(user),
                Err(AuthError::NotFound(_)) => {
                    warn!(
                        provider,
                        user_id = %account.user_id,
                        "linked user no longer exists, creating a new one"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let user = self
            .users
            .create(CreateUser {
                email: profile.email.clone(),
                password: String::new(),
                display_name: profile.name.clone(),
                avatar_url: profile.avatar.clone(),
                method: profile.provider.method(),
                is_verified: true,
            })
            .await?;

        let relinked = match &existing {
            Some(account) => self
                .accounts
                .relink_account(account.id, user.id)
                .await?
                .is_some(),
            None => false,
        };

        if relinked {
            info!(provider, user_id = %user.id, "provider account relinked");
        } else {
            self.accounts
                .insert_account(NewAccount {
                    user_id: user.id,
                    provider: provider.to_string(),
                    external_id: profile.id,
                    access_token: profile.access_token,
                    refresh_token: profile.refresh_token,
                    expires_at: profile.expires_at,
                })
                .await?;
            info!(provider, user_id = %user.id, "provider account linked");
        }

        self.users.find_by_id(user.id).await
    }
}
