//! OAuth 2.0 authorization-code adapter shared by every provider.
//!
//! The exchange protocol is identical across providers: POST the code to the
//! token endpoint, then GET the profile endpoint with the bearer token. Only
//! the endpoints and the profile-field mapping differ, and those are selected
//! by [`ProviderKind`].

use chrono::{DateTime, Utc};
use reqwest::{header::ACCEPT, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, error, info_span, Instrument};
use url::Url;

use super::{google, yandex};
use crate::auth::{error::AuthError, models::AuthMethod, utils::expires_after};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Google,
    Yandex,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Yandex => "yandex",
        }
    }

    #[must_use]
    pub fn method(self) -> AuthMethod {
        match self {
            Self::Google => AuthMethod::Google,
            Self::Yandex => AuthMethod::Yandex,
        }
    }

    #[must_use]
    pub fn default_endpoints(self) -> ProviderEndpoints {
        match self {
            Self::Google => google::endpoints(),
            Self::Yandex => yandex::endpoints(),
        }
    }

    fn map_profile(self, body: Value) -> Result<ProviderProfile, serde_json::Error> {
        match self {
            Self::Google => serde_json::from_value::<google::GoogleProfile>(body).map(Into::into),
            Self::Yandex => serde_json::from_value::<yandex::YandexProfile>(body).map(Into::into),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
}

/// Provider-specific profile fields after mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: String,
    pub email: Option<String>,
    pub name: String,
    pub avatar: Option<String>,
}

/// Common identity shape every provider maps into.
#[derive(Clone)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub provider: ProviderKind,
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("avatar", &self.avatar)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("provider", &self.provider)
            .finish()
    }
}

/// A consent URL together with the `state` value embedded in it.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
}

impl TokenResponse {
    fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
            .or_else(|| {
                self.expires_in
                    .and_then(|seconds| expires_after(now, seconds))
            })
    }
}

#[derive(Clone)]
pub struct OAuthProvider {
    kind: ProviderKind,
    endpoints: ProviderEndpoints,
    client_id: String,
    client_secret: SecretString,
    scopes: Vec<String>,
    base_url: String,
    client: Client,
}

impl OAuthProvider {
    #[must_use]
    pub fn new(
        kind: ProviderKind,
        client_id: String,
        client_secret: SecretString,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            kind,
            endpoints: kind.default_endpoints(),
            client_id,
            client_secret,
            scopes,
            base_url: String::new(),
            client: Client::new(),
        }
    }

    /// Point the adapter at other endpoints (test doubles, regional hosts).
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Attach the shared callback base URL and HTTP client. Called by the registry.
    #[must_use]
    pub(super) fn bind(mut self, base_url: &str, client: Client) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self.client = client;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    #[must_use]
    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn redirect_url(&self) -> String {
        format!("{}/auth/oauth/callback/{}", self.base_url, self.name())
    }

    /// URL the browser is sent to in order to start the consent flow.
    ///
    /// `state` comes back untouched on the callback.
    ///
    /// # Errors
    /// `Internal` when the configured authorization endpoint is not a valid URL.
    pub fn build_authorization_url(&self, state: &str) -> Result<String, AuthError> {
        let scope = self.scopes.join(" ");
        let redirect_uri = self.redirect_url();
        let params = [
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "select_account"),
            ("state", state),
        ];
        Url::parse_with_params(&self.endpoints.authorize_url, &params)
            .map(String::from)
            .map_err(|err| {
                AuthError::Internal(anyhow::anyhow!(
                    "invalid authorization endpoint for {}: {err}",
                    self.name()
                ))
            })
    }

    /// Exchange an authorization code for tokens, then fetch and map the profile.
    ///
    /// # Errors
    /// `ExternalProvider` when either endpoint fails, answers non-2xx, or the
    /// payload lacks an access token, a profile id or an email.
    pub async fn exchange_code_for_profile(&self, code: &str) -> Result<UserInfo, AuthError> {
        let tokens = self.exchange_code(code).await?;
        let Some(access_token) = tokens.access_token.clone().filter(|t| !t.is_empty()) else {
            error!(provider = self.name(), "token response has no access_token");
            return Err(self.token_error());
        };

        let profile = self.fetch_profile(&access_token).await?;
        let Some(email) = profile.email else {
            error!(provider = self.name(), "profile has no email");
            return Err(self.profile_error());
        };

        debug!(provider = self.name(), external_id = %profile.id, "provider profile fetched");
        Ok(UserInfo {
            id: profile.id,
            email,
            name: profile.name,
            avatar: profile.avatar,
            access_token,
            expires_at: tokens.expiry(Utc::now()),
            refresh_token: tokens.refresh_token,
            provider: self.kind,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let redirect_uri = self.redirect_url();
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let span = info_span!(
            "http.client",
            http.method = "POST",
            http.url = %self.endpoints.token_url,
            oauth.provider = self.name()
        );
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .instrument(span)
            .await
            .map_err(|err| {
                error!(provider = self.name(), "token request failed: {err}");
                self.token_error()
            })?;

        if !response.status().is_success() {
            error!(
                provider = self.name(),
                status = %response.status(),
                "token endpoint rejected the code"
            );
            return Err(self.token_error());
        }

        response.json::<TokenResponse>().await.map_err(|err| {
            error!(provider = self.name(), "invalid token response: {err}");
            self.token_error()
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AuthError> {
        let span = info_span!(
            "http.client",
            http.method = "GET",
            http.url = %self.endpoints.profile_url,
            oauth.provider = self.name()
        );
        let response = self
            .client
            .get(&self.endpoints.profile_url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .instrument(span)
            .await
            .map_err(|err| {
                error!(provider = self.name(), "profile request failed: {err}");
                self.profile_error()
            })?;

        if !response.status().is_success() {
            error!(
                provider = self.name(),
                status = %response.status(),
                "profile endpoint rejected the token"
            );
            return Err(self.profile_error());
        }

        let body: Value = response.json().await.map_err(|err| {
            error!(provider = self.name(), "invalid profile response: {err}");
            self.profile_error()
        })?;

        self.kind.map_profile(body).map_err(|err| {
            error!(provider = self.name(), "unexpected profile shape: {err}");
            self.profile_error()
        })
    }

    fn token_error(&self) -> AuthError {
        AuthError::ExternalProvider(format!(
            "Could not obtain an access token from {}. Please try signing in again.",
            self.name()
        ))
    }

    fn profile_error(&self) -> AuthError {
        AuthError::ExternalProvider(format!(
            "Could not load your profile from {}. Check that the granted permissions include email.",
            self.name()
        ))
    }
}

impl fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("kind", &self.kind)
            .field("endpoints", &self.endpoints)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
