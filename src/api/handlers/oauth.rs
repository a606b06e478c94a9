//! OAuth connect and callback endpoints.

use axum::{
    extract::{Extension, Path, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, warn};

use super::{
    auth::with_session_cookie,
    session::{clear_oauth_state_cookie, oauth_state_cookie, oauth_state_matches, session_handle},
    types::{AuthorizationUrlResponse, OAuthCallbackQuery},
};
use crate::auth::{error::MSG_PROVIDER_NOT_FOUND, AuthService};

const DASHBOARD_PATH: &str = "/dashboard/settings";

/// Reject unknown provider names before any flow work starts.
fn provider_guard(service: &AuthService, provider: &str) -> Result<(), Response> {
    if service.providers().resolve(provider).is_some() {
        Ok(())
    } else {
        Err((StatusCode::NOT_FOUND, MSG_PROVIDER_NOT_FOUND.to_string()).into_response())
    }
}

/// Consent URL the frontend should send the browser to.
///
/// The `state` embedded in the URL is also set as a short-lived cookie and
/// checked again on the callback.
#[utoipa::path(
    get,
    path = "/auth/oauth/connect/{provider}",
    params(
        ("provider" = String, Path, description = "Provider name, e.g. google or yandex")
    ),
    responses(
        (status = 200, description = "Authorization URL", body = AuthorizationUrlResponse),
        (status = 404, description = "Unknown provider", body = String)
    ),
    tag = "oauth"
)]
pub async fn connect(
    Path(provider): Path<String>,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    if let Err(response) = provider_guard(&service, &provider) {
        return response;
    }
    let request = match service.authorization_url(&provider) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    let cookie = match oauth_state_cookie(service.config(), &request.state) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build OAuth state cookie: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "OAuth state unavailable".to_string(),
            )
                .into_response();
        }
    };

    let mut response = Json(AuthorizationUrlResponse { url: request.url }).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    response
}

/// Provider redirect target: exchange the code, sign in, and bounce to the dashboard.
#[utoipa::path(
    get,
    path = "/auth/oauth/callback/{provider}",
    params(
        ("provider" = String, Path, description = "Provider name"),
        OAuthCallbackQuery
    ),
    responses(
        (status = 303, description = "Signed in, redirecting to the dashboard"),
        (status = 400, description = "Missing authorization code or state mismatch", body = String),
        (status = 404, description = "Unknown provider", body = String),
        (status = 409, description = "Email already registered by another user", body = String),
        (status = 502, description = "Provider exchange failed", body = String)
    ),
    tag = "oauth"
)]
pub async fn callback(
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    if let Err(response) = provider_guard(&service, &provider) {
        return response;
    }

    let Some(code) = query.code.filter(|code| !code.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            "Authorization code was not provided".to_string(),
        )
            .into_response();
    };

    if !oauth_state_matches(&headers, query.state.as_deref()) {
        warn!(provider = %provider, "OAuth callback state mismatch");
        return (
            StatusCode::BAD_REQUEST,
            "OAuth state is missing or does not match".to_string(),
        )
            .into_response();
    }

    let mut handle = session_handle(&headers, service.config());
    let mut response = match service.oauth_callback(&mut handle, &provider, &code).await {
        Ok(_) => {
            let target = format!("{}{DASHBOARD_PATH}", service.config().frontend_base_url());
            with_session_cookie(&service, &handle, Redirect::to(&target))
        }
        Err(err) => err.into_response(),
    };

    // The state is single use whatever the outcome.
    match clear_oauth_state_cookie(service.config()) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build OAuth state clearing cookie: {err}"),
    }
    response
}
