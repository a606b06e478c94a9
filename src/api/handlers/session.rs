//! Session cookie and bearer plumbing between HTTP headers and `SessionHandle`.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

use crate::auth::{utils::hash_token, AuthConfig, SessionHandle};

pub const OAUTH_STATE_COOKIE: &str = "authgate_oauth_state";
const OAUTH_STATE_PATH: &str = "/auth/oauth";
const OAUTH_STATE_TTL_SECONDS: i64 = 10 * 60;

/// Build the per-request session handle from the bearer header or cookie.
pub fn session_handle(headers: &HeaderMap, config: &AuthConfig) -> SessionHandle {
    SessionHandle::from_token(extract_session_token(headers, config.session_cookie_name()))
}

/// `HttpOnly` cookie carrying the raw session token.
pub fn session_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.session_cookie_name();
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie =
        format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.session_cookie_name();
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Short-lived cookie holding the `state` handed to the provider on connect.
pub fn oauth_state_cookie(
    config: &AuthConfig,
    state: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{OAUTH_STATE_COOKIE}={state}; Path={OAUTH_STATE_PATH}; HttpOnly; SameSite=Lax; \
         Max-Age={OAUTH_STATE_TTL_SECONDS}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_oauth_state_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{OAUTH_STATE_COOKIE}=; Path={OAUTH_STATE_PATH}; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// True when the callback `state` matches the one stored in the state cookie.
pub fn oauth_state_matches(headers: &HeaderMap, state: Option<&str>) -> bool {
    let (Some(expected), Some(presented)) = (cookie_value(headers, OAUTH_STATE_COOKIE), state)
    else {
        return false;
    };
    !presented.is_empty() && hash_token(&expected) == hash_token(presented)
}

fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    extract_bearer_token(headers).or_else(|| cookie_value(headers, cookie_name))
}

fn cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == cookie_name && !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
