//! Credential registration, login and logout endpoints.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::{
    session::{clear_session_cookie, session_cookie, session_handle},
    types::{LoginRequest, RegisterRequest, RegisterResponse, UserProfile},
};
use crate::auth::{
    utils::{normalize_email, valid_email},
    AuthService, SessionHandle,
};

const MSG_REGISTERED: &str =
    "Registration complete. Check your inbox and follow the link to confirm your email.";

/// Create a credentials account and send the confirmation email. No session is issued.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, confirmation email sent", body = RegisterResponse),
        (status = 400, description = "Invalid payload", body = String),
        (status = 409, description = "Email already registered", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Password is required".to_string()).into_response();
    }
    if request.password != request.password_repeat {
        return (StatusCode::BAD_REQUEST, "Passwords do not match".to_string()).into_response();
    }
    let name = request.name.trim();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Name is required".to_string()).into_response();
    }

    match service.register(&email, &request.password, name).await {
        Ok(registered) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                message: MSG_REGISTERED.to_string(),
                email: registered.user.email,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Sign in with email and password; sets a fresh session cookie.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = UserProfile),
        (status = 401, description = "Wrong password or email not verified", body = String),
        (status = 404, description = "Unknown email or no password set", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let mut handle = session_handle(&headers, service.config());
    match service
        .login(&mut handle, &request.email, &request.password)
        .await
    {
        Ok(user) => with_session_cookie(&service, &handle, Json(UserProfile::from(user))),
        Err(err) => err.into_response(),
    }
}

/// End the current session and clear the cookie.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Session ended"),
        (status = 500, description = "Session could not be ended", body = String)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, service: Extension<Arc<AuthService>>) -> impl IntoResponse {
    let mut handle = session_handle(&headers, service.config());
    if let Err(err) = service.logout(&mut handle).await {
        return err.into_response();
    }

    let mut response_headers = HeaderMap::new();
    match clear_session_cookie(service.config()) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Attach the cookie for the session the handle now carries.
pub(super) fn with_session_cookie(
    service: &AuthService,
    handle: &SessionHandle,
    body: impl IntoResponse,
) -> axum::response::Response {
    let Some(token) = handle.token() else {
        error!("session handle is empty after a successful save");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session unavailable".to_string(),
        )
            .into_response();
    };
    match session_cookie(service.config(), token) {
        Ok(cookie) => {
            let mut response_headers = HeaderMap::new();
            response_headers.insert(SET_COOKIE, cookie);
            (response_headers, body).into_response()
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session unavailable".to_string(),
            )
                .into_response()
        }
    }
}
