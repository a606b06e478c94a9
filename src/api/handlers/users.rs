//! Profile endpoints behind the session guard.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    principal::{require_role, require_user},
    types::{UpdateProfileRequest, UserProfile},
};
use crate::{
    auth::{
        utils::{normalize_email, valid_email},
        AuthService, UserRole,
    },
    store::UserChanges,
};

#[utoipa::path(
    get,
    path = "/users/profile",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "No session", body = String)
    ),
    tag = "users"
)]
pub async fn get_profile(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    match require_user(&headers, &service).await {
        Ok(user) => Json(UserProfile::from(user)).into_response(),
        Err(response) => response,
    }
}

#[utoipa::path(
    patch,
    path = "/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated user", body = UserProfile),
        (status = 400, description = "Invalid payload", body = String),
        (status = 401, description = "No session", body = String),
        (status = 409, description = "Email already registered", body = String)
    ),
    tag = "users"
)]
pub async fn update_profile(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<UpdateProfileRequest>>,
) -> impl IntoResponse {
    let user = match require_user(&headers, &service).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let email = request.email.as_deref().map(normalize_email);
    if email.as_deref().is_some_and(|email| !valid_email(email)) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    let name = request.name.map(|name| name.trim().to_string());
    if name.as_deref().is_some_and(str::is_empty) {
        return (StatusCode::BAD_REQUEST, "Name must not be empty".to_string()).into_response();
    }

    let changes = UserChanges {
        email,
        display_name: name,
        is_two_factor_enabled: request.is_two_factor_enabled,
    };
    match service.update_profile(user.id, changes).await {
        Ok(user) => Json(UserProfile::from(user)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/users/by-id/{id}",
    params(
        ("id" = Uuid, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User", body = UserProfile),
        (status = 401, description = "No session", body = String),
        (status = 403, description = "Caller is not an admin", body = String),
        (status = 404, description = "Unknown user", body = String)
    ),
    tag = "users"
)]
pub async fn find_by_id(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    if let Err(response) = require_role(&headers, &service, UserRole::Admin).await {
        return response;
    }
    match service.find_user(id).await {
        Ok(user) => Json(UserProfile::from(user)).into_response(),
        Err(err) => err.into_response(),
    }
}
