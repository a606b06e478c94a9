use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use super::types::{EmailConfirmationRequest, MessageResponse};
use crate::auth::AuthService;

const MSG_CONFIRMED: &str = "Your email has been confirmed. You can now sign in.";

/// Consume the emailed confirmation token. The user signs in afterwards.
#[utoipa::path(
    post,
    path = "/auth/email-confirmation",
    request_body = EmailConfirmationRequest,
    responses(
        (status = 200, description = "Email confirmed", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = String),
        (status = 404, description = "No user for this token", body = String)
    ),
    tag = "auth"
)]
pub async fn email_confirmation(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<EmailConfirmationRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match service.verify_email(&request.token).await {
        Ok(_) => Json(MessageResponse {
            message: MSG_CONFIRMED.to_string(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}
