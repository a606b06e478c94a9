use serde::Deserialize;

use super::provider::{ProviderEndpoints, ProviderProfile};

pub const AUTHORIZE_URL: &str = "https://oauth.yandex.ru/authorize";
pub const TOKEN_URL: &str = "https://oauth.yandex.ru/token";
pub const PROFILE_URL: &str = "https://login.yandex.ru/info?format=json";

const AVATAR_URL_PREFIX: &str = "https://avatars.yandex.net/get-yapic";
const AVATAR_SIZE: &str = "islands-200";

pub(super) fn endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        authorize_url: AUTHORIZE_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        profile_url: PROFILE_URL.to_string(),
    }
}

/// Yandex ID `login.yandex.ru/info` payload (only the fields we map).
#[derive(Debug, Deserialize)]
pub(super) struct YandexProfile {
    id: String,
    login: Option<String>,
    #[serde(default)]
    emails: Vec<String>,
    default_email: Option<String>,
    display_name: Option<String>,
    real_name: Option<String>,
    default_avatar_id: Option<String>,
    #[serde(default)]
    is_avatar_empty: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl From<YandexProfile> for ProviderProfile {
    fn from(profile: YandexProfile) -> Self {
        let email = non_empty(profile.emails.into_iter().next()).or(non_empty(profile.default_email));
        let name = non_empty(profile.display_name)
            .or(non_empty(profile.real_name))
            .or(non_empty(profile.login))
            .unwrap_or_default();
        let avatar = if profile.is_avatar_empty {
            None
        } else {
            non_empty(profile.default_avatar_id)
                .map(|id| format!("{AVATAR_URL_PREFIX}/{id}/{AVATAR_SIZE}"))
        };

        Self {
            id: profile.id,
            email,
            name,
            avatar,
        }
    }
}
