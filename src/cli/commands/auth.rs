use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

use crate::auth::config::{
    DEFAULT_EMAIL_TOKEN_TTL_SECONDS, DEFAULT_SESSION_COOKIE_NAME, DEFAULT_SESSION_TTL_SECONDS,
    MAX_EMAIL_TOKEN_TTL_SECONDS, MAX_SESSION_TTL_SECONDS,
};

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_EMAIL_TOKEN_TTL_SECONDS: &str = "email-token-ttl-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_NAME: &str = "session-name";

#[derive(Debug, Clone)]
pub struct Options {
    pub base_url: String,
    pub frontend_base_url: String,
    pub email_token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub session_name: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a required value is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            base_url: matches
                .get_one::<String>(ARG_BASE_URL)
                .cloned()
                .context("missing required argument: --base-url")?,
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            email_token_ttl_seconds: matches
                .get_one::<i64>(ARG_EMAIL_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_EMAIL_TOKEN_TTL_SECONDS),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_SESSION_TTL_SECONDS),
            session_name: matches
                .get_one::<String>(ARG_SESSION_NAME)
                .cloned()
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public URL of this service, used for OAuth callback URLs")
                .env("AUTHGATE_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for verification links, CORS and redirects")
                .env("AUTHGATE_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_EMAIL_TOKEN_TTL_SECONDS)
                .long(ARG_EMAIL_TOKEN_TTL_SECONDS)
                .help("Email verification token TTL in seconds, at most 30 days")
                .env("AUTHGATE_EMAIL_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_EMAIL_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session TTL in seconds, at most 365 days")
                .env("AUTHGATE_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_NAME)
                .long(ARG_SESSION_NAME)
                .help("Session cookie name")
                .env("AUTHGATE_SESSION_NAME")
                .default_value(DEFAULT_SESSION_COOKIE_NAME),
        )
}
