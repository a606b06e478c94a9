//! Top-level auth flows.
//!
//! Each operation runs once per request and awaits its collaborators in
//! sequence. Nothing is retried here; the first failure is returned as is.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    accounts::AccountLinker,
    config::AuthConfig,
    error::{
        AuthError, MSG_EMAIL_NOT_VERIFIED, MSG_EMAIL_TAKEN, MSG_INVALID_PASSWORD,
        MSG_PROVIDER_NOT_FOUND, MSG_USER_NOT_FOUND,
    },
    models::{AuthMethod, User},
    password::PasswordHasher,
    session::{SessionHandle, SessionManager},
    users::{CreateUser, UserDirectory},
    utils::generate_token,
    verification::VerificationTokenIssuer,
};
use crate::{
    email::EmailSender,
    oauth::{AuthorizationRequest, OAuthProvider, ProviderRegistry},
    store::{AuthStore, StoreHealth, UserChanges},
};

/// Outcome of a registration: the account exists but has no session yet.
#[derive(Debug)]
pub struct Registered {
    pub user: User,
}

pub struct AuthService {
    config: AuthConfig,
    users: UserDirectory,
    linker: AccountLinker,
    verification: VerificationTokenIssuer,
    sessions: SessionManager,
    providers: Arc<ProviderRegistry>,
    health: Arc<dyn StoreHealth>,
}

impl AuthService {
    pub fn new<S: AuthStore>(
        store: Arc<S>,
        providers: Arc<ProviderRegistry>,
        sender: Arc<dyn EmailSender>,
        config: AuthConfig,
    ) -> Self {
        Self::with_hasher(store, providers, sender, config, PasswordHasher::new())
    }

    pub fn with_hasher<S: AuthStore>(
        store: Arc<S>,
        providers: Arc<ProviderRegistry>,
        sender: Arc<dyn EmailSender>,
        config: AuthConfig,
        hasher: PasswordHasher,
    ) -> Self {
        let users = UserDirectory::new(store.clone(), store.clone(), hasher);
        let linker = AccountLinker::new(users.clone(), store.clone());
        let verification = VerificationTokenIssuer::new(
            store.clone(),
            sender,
            config.frontend_base_url().to_string(),
            config.email_token_ttl_seconds(),
        );
        let sessions = SessionManager::new(store.clone(), config.session_ttl_seconds());

        Self {
            config,
            users,
            linker,
            verification,
            sessions,
            providers,
            health: store,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Create an unverified credentials user and send the confirmation link.
    ///
    /// # Errors
    /// `Conflict` when the email is taken, `EmailDelivery` when the link cannot be sent.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Registered, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::Conflict(MSG_EMAIL_TAKEN.to_string()));
        }

        let user = self
            .users
            .create(CreateUser {
                email: email.to_string(),
                password: password.to_string(),
                display_name: display_name.to_string(),
                avatar_url: None,
                method: AuthMethod::Credentials,
                is_verified: false,
            })
            .await?;

        self.verification.issue(&user.email).await?;
        info!(user_id = %user.id, "user registered");
        Ok(Registered { user })
    }

    /// Check credentials and bind the session to the user.
    ///
    /// An unverified user gets a fresh confirmation link and the call still fails.
    ///
    /// # Errors
    /// `NotFound` for unknown emails or accounts without a credential,
    /// `Unauthorized` for a bad password or an unverified email,
    /// `SessionPersist` when the session cannot be stored.
    #[instrument(skip(self, handle, password))]
    pub async fn login(
        &self,
        handle: &mut SessionHandle,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Err(AuthError::NotFound(MSG_USER_NOT_FOUND.to_string()));
        };

        let Some(hash) = user.password_hash.as_deref().filter(|_| !password.is_empty()) else {
            return Err(AuthError::NotFound(MSG_USER_NOT_FOUND.to_string()));
        };

        if !self.users.hasher().verify(hash, password) {
            return Err(AuthError::Unauthorized(MSG_INVALID_PASSWORD.to_string()));
        }

        if !user.is_verified {
            self.verification.issue(&user.email).await?;
            warn!(user_id = %user.id, "login blocked until email is verified");
            return Err(AuthError::Unauthorized(MSG_EMAIL_NOT_VERIFIED.to_string()));
        }

        self.sessions.save_session(handle, user).await
    }

    /// Finish the provider consent flow and bind the session to the linked user.
    ///
    /// # Errors
    /// `NotFound` for an unknown provider, `ExternalProvider` when the exchange
    /// fails, `Conflict` when the profile email belongs to another user.
    #[instrument(skip(self, handle, code))]
    pub async fn oauth_callback(
        &self,
        handle: &mut SessionHandle,
        provider: &str,
        code: &str,
    ) -> Result<User, AuthError> {
        let adapter = self.resolve_provider(provider)?;
        let profile = adapter.exchange_code_for_profile(code).await?;
        let user = self.linker.link_or_create(profile).await?;
        self.sessions.save_session(handle, user).await
    }

    /// # Errors
    /// `SessionPersist` when there is no live session or the store fails.
    #[instrument(skip(self, handle))]
    pub async fn logout(&self, handle: &mut SessionHandle) -> Result<(), AuthError> {
        self.sessions.destroy_session(handle).await
    }

    /// Consume a confirmation token. No session is created.
    ///
    /// # Errors
    /// `InvalidOrExpired` for unknown, reused or expired tokens.
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> Result<String, AuthError> {
        let email = self.verification.consume(token).await?;
        info!(to_email = %email, "email verified");
        Ok(email)
    }

    /// Consent URL for `provider` with a fresh random `state`.
    ///
    /// The caller keeps `state` on the client and compares it on the callback.
    ///
    /// # Errors
    /// `NotFound` for an unknown provider.
    pub fn authorization_url(&self, provider: &str) -> Result<AuthorizationRequest, AuthError> {
        let provider = self.resolve_provider(provider)?;
        let state = generate_token().map_err(AuthError::Internal)?;
        let url = provider.build_authorization_url(&state)?;
        Ok(AuthorizationRequest { url, state })
    }

    /// User bound to the session, if any. Sessions of deleted users resolve to `None`.
    ///
    /// # Errors
    /// Only store failures.
    pub async fn current_user(&self, handle: &SessionHandle) -> Result<Option<User>, AuthError> {
        let Some(user_id) = self.sessions.current_user_id(handle).await? else {
            return Ok(None);
        };
        match self.users.find_by_id(user_id).await {
            Ok(user) => Ok(Some(user)),
            Err(AuthError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// # Errors
    /// `NotFound` when the id does not resolve.
    pub async fn find_user(&self, id: Uuid) -> Result<User, AuthError> {
        self.users.find_by_id(id).await
    }

    /// # Errors
    /// `NotFound` for an unknown id, `Conflict` when a new email is taken.
    #[instrument(skip(self, changes))]
    pub async fn update_profile(&self, id: Uuid, changes: UserChanges) -> Result<User, AuthError> {
        if changes.is_empty() {
            return self.users.find_by_id(id).await;
        }
        self.users.update(id, changes).await
    }

    /// # Errors
    /// `Internal` when the store is unreachable.
    pub async fn ping(&self) -> Result<(), AuthError> {
        self.health.ping().await.map_err(AuthError::from)
    }

    fn resolve_provider(&self, name: &str) -> Result<&OAuthProvider, AuthError> {
        self.providers
            .resolve(name)
            .ok_or_else(|| AuthError::NotFound(MSG_PROVIDER_NOT_FOUND.to_string()))
    }
}
