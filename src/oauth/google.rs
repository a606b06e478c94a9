use serde::Deserialize;

use super::provider::{ProviderEndpoints, ProviderProfile};

pub const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const PROFILE_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

pub(super) fn endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        authorize_url: AUTHORIZE_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        profile_url: PROFILE_URL.to_string(),
    }
}

/// OpenID Connect userinfo payload.
#[derive(Debug, Deserialize)]
pub(super) struct GoogleProfile {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl From<GoogleProfile> for ProviderProfile {
    fn from(profile: GoogleProfile) -> Self {
        let name = profile
            .name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| profile.email.clone())
            .unwrap_or_default();
        Self {
            id: profile.sub,
            email: profile.email.filter(|email| !email.is_empty()),
            name,
            avatar: profile.picture.filter(|url| !url.is_empty()),
        }
    }
}
