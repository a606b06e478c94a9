//! Access guards for session-protected routes.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::session::session_handle;
use crate::auth::{AuthService, User, UserRole};

const MSG_UNAUTHENTICATED: &str = "You are not signed in. Please sign in to continue.";
const MSG_FORBIDDEN: &str = "You do not have permission to access this resource.";

/// Resolve the caller's session to a user or answer 401.
pub async fn require_user(headers: &HeaderMap, service: &AuthService) -> Result<User, Response> {
    let handle = session_handle(headers, service.config());
    match service.current_user(&handle).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            debug!("request without a live session");
            Err((StatusCode::UNAUTHORIZED, MSG_UNAUTHENTICATED).into_response())
        }
        Err(err) => Err(err.into_response()),
    }
}

/// Like [`require_user`], then answer 403 unless the user has `role`.
pub async fn require_role(
    headers: &HeaderMap,
    service: &AuthService,
    role: UserRole,
) -> Result<User, Response> {
    let user = require_user(headers, service).await?;
    if user.role == role {
        Ok(user)
    } else {
        Err((StatusCode::FORBIDDEN, MSG_FORBIDDEN).into_response())
    }
}
