//! Email normalization and opaque token helpers.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Create an unguessable token for email links and session cookies.
///
/// The raw value only goes to the client; the store keeps [`hash_token`] of it.
///
/// # Errors
/// Fails if the OS random source is unavailable.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[must_use]
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// `now + seconds`, or `None` when the result does not fit a timestamp.
#[must_use]
pub fn expires_after(now: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(seconds).and_then(|ttl| now.checked_add_signed(ttl))
}

/// Build the frontend verification link included in outbound emails.
#[must_use]
pub fn build_verify_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/auth/new-verification?token={token}")
}
