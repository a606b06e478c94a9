//! Map validated CLI matches to the action the binary runs.

use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::cli::{
    actions::{server::Args, Action},
    commands::{self, auth, oauth},
};

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let providers = oauth::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        base_url: auth_opts.base_url,
        frontend_base_url: auth_opts.frontend_base_url,
        email_token_ttl_seconds: auth_opts.email_token_ttl_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        session_name: auth_opts.session_name,
        providers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::ProviderKind;
    use secrecy::ExposeSecret;

    const DSN: &str = "postgres://user@localhost:5432/authgate";

    fn clean_env() -> [(&'static str, Option<&'static str>); 7] {
        [
            ("AUTHGATE_DSN", Some(DSN)),
            ("AUTHGATE_PORT", None),
            ("AUTHGATE_GOOGLE_CLIENT_ID", None),
            ("AUTHGATE_GOOGLE_CLIENT_SECRET", None),
            ("AUTHGATE_YANDEX_CLIENT_ID", None),
            ("AUTHGATE_YANDEX_CLIENT_SECRET", None),
            ("AUTHGATE_YANDEX_SCOPES", None),
        ]
    }

    #[test]
    fn server_action_carries_settings() {
        temp_env::with_vars(clean_env(), || {
            let matches = commands::new().get_matches_from(vec![
                "authgate",
                "--port",
                "9000",
                "--base-url",
                "https://api.example.com/",
                "--session-name",
                "sid",
            ]);
            let Ok(Action::Server(args)) = handler(&matches) else {
                panic!("expected a server action");
            };
            assert_eq!(args.port, 9000);
            assert_eq!(args.dsn.expose_secret(), DSN);
            assert_eq!(args.base_url, "https://api.example.com/");
            assert_eq!(args.session_name, "sid");
            assert_eq!(args.session_ttl_seconds, 604_800);
            assert!(args.providers.is_empty());
        });
    }

    #[test]
    fn provider_needs_both_id_and_secret() {
        temp_env::with_vars(clean_env(), || {
            let matches = commands::new().get_matches_from(vec![
                "authgate",
                "--google-client-id",
                "google-id",
                "--yandex-client-id",
                "yandex-id",
                "--yandex-client-secret",
                "yandex-secret",
                "--yandex-scopes",
                "login:email,login:info",
            ]);
            let Ok(Action::Server(args)) = handler(&matches) else {
                panic!("expected a server action");
            };
            assert_eq!(args.providers.len(), 1);
            let yandex = &args.providers[0];
            assert_eq!(yandex.kind, ProviderKind::Yandex);
            assert_eq!(yandex.client_id, "yandex-id");
            assert_eq!(yandex.client_secret.expose_secret(), "yandex-secret");
            assert_eq!(yandex.scopes, vec!["login:email", "login:info"]);
        });
    }

    #[test]
    fn debug_output_hides_secrets() {
        temp_env::with_vars(clean_env(), || {
            let matches = commands::new().get_matches_from(vec![
                "authgate",
                "--google-client-id",
                "google-id",
                "--google-client-secret",
                "super-secret",
            ]);
            let Ok(action) = handler(&matches) else {
                panic!("expected a server action");
            };
            let rendered = format!("{action:?}");
            assert!(!rendered.contains("super-secret"));
            assert!(!rendered.contains("user@localhost"));
        });
    }
}
