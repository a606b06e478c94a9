//! Runtime settings for the auth engine, built once at startup.

pub const DEFAULT_EMAIL_TOKEN_TTL_SECONDS: i64 = 60 * 60;
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "authgate_session";
pub const MAX_EMAIL_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
pub const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    frontend_base_url: String,
    email_token_ttl_seconds: i64,
    session_ttl_seconds: i64,
    session_cookie_name: String,
}

impl AuthConfig {
    /// `base_url` is this service's public URL; `frontend_base_url` hosts the UI.
    #[must_use]
    pub fn new(base_url: String, frontend_base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            frontend_base_url: frontend_base_url.trim_end_matches('/').to_string(),
            email_token_ttl_seconds: DEFAULT_EMAIL_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_email_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.email_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: String) -> Self {
        self.session_cookie_name = name;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn email_token_ttl_seconds(&self) -> i64 {
        self.email_token_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_trimmed_urls() {
        let config = AuthConfig::new(
            "http://localhost:8080/".to_string(),
            "http://localhost:3000/".to_string(),
        );
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert_eq!(config.frontend_base_url(), "http://localhost:3000");
        assert_eq!(config.email_token_ttl_seconds(), 3600);
        assert_eq!(config.session_ttl_seconds(), 604_800);
        assert_eq!(config.session_cookie_name(), "authgate_session");
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn builder_overrides() {
        let config = AuthConfig::new(
            "https://api.example.com".to_string(),
            "https://app.example.com".to_string(),
        )
        .with_email_token_ttl_seconds(60)
        .with_session_ttl_seconds(120)
        .with_session_cookie_name("sid".to_string());
        assert_eq!(config.email_token_ttl_seconds(), 60);
        assert_eq!(config.session_ttl_seconds(), 120);
        assert_eq!(config.session_cookie_name(), "sid");
        assert!(config.session_cookie_secure());
    }
}
