//! Request and response bodies for the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{Account, User};

#[derive(ToSchema, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_repeat: String,
    pub name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub message: String,
    pub email: String,
}

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct EmailConfirmationRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthorizationUrlResponse {
    pub url: String,
}

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct OAuthCallbackQuery {
    /// Authorization code returned by the provider.
    pub code: Option<String>,
    /// Echo of the `state` sent with the authorization URL.
    pub state: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub is_two_factor_enabled: Option<bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub provider: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub picture: Option<String>,
    pub role: String,
    pub method: String,
    pub is_verified: bool,
    pub is_two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accounts: Vec<LinkedAccount>,
}

impl From<&Account> for LinkedAccount {
    fn from(account: &Account) -> Self {
        Self {
            provider: account.provider.clone(),
            kind: account.kind.clone(),
            created_at: account.created_at,
        }
    }
}

/// Public view of a user. Password hashes and provider tokens never leave the server.
impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            accounts: user.accounts.iter().map(LinkedAccount::from).collect(),
            email: user.email,
            display_name: user.display_name,
            picture: user.avatar_url,
            role: user.role.as_str().to_string(),
            method: user.method.as_str().to_string(),
            is_verified: user.is_verified,
            is_two_factor_enabled: user.is_two_factor_enabled,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
