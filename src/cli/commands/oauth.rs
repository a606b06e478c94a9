use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::oauth::ProviderKind;

pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_GOOGLE_SCOPES: &str = "google-scopes";
pub const ARG_YANDEX_CLIENT_ID: &str = "yandex-client-id";
pub const ARG_YANDEX_CLIENT_SECRET: &str = "yandex-client-secret";
pub const ARG_YANDEX_SCOPES: &str = "yandex-scopes";

/// Credentials for one external identity provider.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scopes: Vec<String>,
}

/// Providers that have both a client id and a secret. The rest stay disabled.
#[must_use]
pub fn parse(matches: &ArgMatches) -> Vec<ProviderOptions> {
    [
        (
            ProviderKind::Google,
            ARG_GOOGLE_CLIENT_ID,
            ARG_GOOGLE_CLIENT_SECRET,
            ARG_GOOGLE_SCOPES,
        ),
        (
            ProviderKind::Yandex,
            ARG_YANDEX_CLIENT_ID,
            ARG_YANDEX_CLIENT_SECRET,
            ARG_YANDEX_SCOPES,
        ),
    ]
    .into_iter()
    .filter_map(|(kind, id_arg, secret_arg, scopes_arg)| {
        let client_id = non_empty(matches, id_arg)?;
        let client_secret = non_empty(matches, secret_arg)?;
        let scopes = matches
            .get_one::<String>(scopes_arg)
            .map(|raw| split_scopes(raw))
            .unwrap_or_default();
        Some(ProviderOptions {
            kind,
            client_id,
            client_secret: SecretString::from(client_secret),
            scopes,
        })
    })
    .collect()
}

fn non_empty(matches: &ArgMatches, id: &str) -> Option<String> {
    matches
        .get_one::<String>(id)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Scopes may be separated by commas, whitespace or both.
fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|scope| !scope.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth client id")
                .env("AUTHGATE_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("AUTHGATE_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_GOOGLE_SCOPES)
                .long(ARG_GOOGLE_SCOPES)
                .help("Google OAuth scopes")
                .env("AUTHGATE_GOOGLE_SCOPES")
                .default_value("email profile"),
        )
        .arg(
            Arg::new(ARG_YANDEX_CLIENT_ID)
                .long(ARG_YANDEX_CLIENT_ID)
                .help("Yandex OAuth client id")
                .env("AUTHGATE_YANDEX_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_YANDEX_CLIENT_SECRET)
                .long(ARG_YANDEX_CLIENT_SECRET)
                .help("Yandex OAuth client secret")
                .env("AUTHGATE_YANDEX_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_YANDEX_SCOPES)
                .long(ARG_YANDEX_SCOPES)
                .help("Yandex OAuth scopes")
                .env("AUTHGATE_YANDEX_SCOPES")
                .default_value("login:email login:info"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_scopes_accepts_commas_and_spaces() {
        assert_eq!(
            split_scopes("email, profile openid"),
            vec!["email", "profile", "openid"]
        );
        assert!(split_scopes(" , ").is_empty());
    }
}
