//! External identity providers.
//!
//! [`ProviderRegistry`] is built once at startup from the configured adapters
//! and never changes afterwards, so request handlers share it through an `Arc`
//! without locking.

use anyhow::{Context, Result};
use reqwest::Client;

pub mod google;
pub mod provider;
pub mod yandex;

pub use provider::{
    AuthorizationRequest, OAuthProvider, ProviderEndpoints, ProviderKind, UserInfo,
};

use crate::APP_USER_AGENT;

#[derive(Debug)]
pub struct ProviderRegistry {
    base_url: String,
    providers: Vec<OAuthProvider>,
}

impl ProviderRegistry {
    /// Hand every adapter the shared callback base URL and one HTTP client.
    ///
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn new(base_url: &str, providers: Vec<OAuthProvider>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("failed to build OAuth HTTP client")?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let providers = providers
            .into_iter()
            .map(|provider| provider.bind(&base_url, client.clone()))
            .collect();

        Ok(Self {
            base_url,
            providers,
        })
    }

    /// Exact-name lookup. An unknown name is `None`, not an error.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&OAuthProvider> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(OAuthProvider::name).collect()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
