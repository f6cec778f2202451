use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::repo_types::Session;
use crate::users::dto::PublicUser;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after login. The token itself only travels in the cookie.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_on: OffsetDateTime,
}

/// A session as shown to its owner.
#[derive(Debug, Serialize)]
pub struct SessionView {
    /// First characters of the token, enough to tell sessions apart.
    pub token_hint: String,
    pub current: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_on: OffsetDateTime,
}

impl SessionView {
    pub fn new(session: &Session, current_token: &str) -> Self {
        Self {
            token_hint: session.id.chars().take(6).collect(),
            current: session.id == current_token,
            expires_on: session.expires_on,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub revoked: u64,
}
