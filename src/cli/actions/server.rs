use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    api,
    auth::{AuthConfig, AuthService},
    cli::commands::oauth::ProviderOptions,
    email::LogEmailSender,
    oauth::{OAuthProvider, ProviderRegistry},
    store::postgres::PgStore,
};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub base_url: String,
    pub frontend_base_url: String,
    pub email_token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub session_name: String,
    pub providers: Vec<ProviderOptions>,
}

/// Connect the store, assemble the auth engine and serve HTTP.
///
/// # Errors
/// Returns an error if the database is unreachable, the schema cannot be
/// applied, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(args.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(pool);
    store
        .apply_schema()
        .await
        .context("Failed to apply database schema")?;
    debug!("Database schema applied");

    let providers: Vec<OAuthProvider> = args
        .providers
        .into_iter()
        .map(|options| {
            OAuthProvider::new(
                options.kind,
                options.client_id,
                options.client_secret,
                options.scopes,
            )
        })
        .collect();
    let registry = ProviderRegistry::new(&args.base_url, providers)?;
    info!("OAuth providers enabled: {:?}", registry.names());

    let config = AuthConfig::new(args.base_url, args.frontend_base_url)
        .with_email_token_ttl_seconds(args.email_token_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_cookie_name(args.session_name);

    let service = AuthService::new(
        Arc::new(store),
        Arc::new(registry),
        Arc::new(LogEmailSender),
        config,
    );

    api::new(args.port, Arc::new(service)).await
}
