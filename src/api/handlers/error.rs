use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::auth::AuthError;

#[must_use]
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Conflict(_) => StatusCode::CONFLICT,
        AuthError::NotFound(_) => StatusCode::NOT_FOUND,
        AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AuthError::InvalidOrExpired => StatusCode::BAD_REQUEST,
        AuthError::ExternalProvider(_) => StatusCode::BAD_GATEWAY,
        AuthError::SessionPersist(_) | AuthError::EmailDelivery(_) | AuthError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if let Self::Internal(source) | Self::EmailDelivery(source) = &self {
            error!("{self}: {source:#}");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        let cases = [
            (AuthError::Conflict(String::new()), StatusCode::CONFLICT),
            (AuthError::NotFound(String::new()), StatusCode::NOT_FOUND),
            (AuthError::Unauthorized(String::new()), StatusCode::UNAUTHORIZED),
            (AuthError::InvalidOrExpired, StatusCode::BAD_REQUEST),
            (AuthError::ExternalProvider(String::new()), StatusCode::BAD_GATEWAY),
            (
                AuthError::SessionPersist(String::new()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AuthError::Internal(anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected);
        }
    }

    #[test]
    fn internal_response_hides_cause() {
        let response = AuthError::Internal(anyhow!("password=hunter2")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
