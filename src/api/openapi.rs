use utoipa::OpenApi;

use super::handlers::{auth, health, oauth, types, users, verification};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register,
        auth::login,
        auth::logout,
        oauth::connect,
        oauth::callback,
        verification::email_confirmation,
        users::get_profile,
        users::update_profile,
        users::find_by_id,
    ),
    components(schemas(
        health::Health,
        types::RegisterRequest,
        types::RegisterResponse,
        types::LoginRequest,
        types::MessageResponse,
        types::EmailConfirmationRequest,
        types::AuthorizationUrlResponse,
        types::UpdateProfileRequest,
        types::UserProfile,
        types::LinkedAccount,
    )),
    tags(
        (name = "health", description = "Service and store health"),
        (name = "auth", description = "Registration, login, logout and email confirmation"),
        (name = "oauth", description = "Sign-in through external identity providers"),
        (name = "users", description = "Profiles of signed-in users")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        for name in ["health", "auth", "oauth", "users"] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag {name}");
        }
        for path in [
            "/health",
            "/auth/register",
            "/auth/login",
            "/auth/logout",
            "/auth/email-confirmation",
            "/auth/oauth/connect/{provider}",
            "/auth/oauth/callback/{provider}",
            "/users/profile",
            "/users/by-id/{id}",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path {path}");
        }
    }
}
