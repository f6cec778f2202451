use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::{cookies::read_session_cookie, token::looks_like_token};
use crate::{error::AppError, state::AppState, users::repo_types::User};

/// Resolves the session cookie, returning the token and its owning user.
pub struct CurrentSession {
    pub token: String,
    pub user: User,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = read_session_cookie(&parts.headers).ok_or(AppError::Unauthorized)?;
        if !looks_like_token(&token) {
            return Err(AppError::Unauthorized);
        }

        match state.auth.resolve(&token).await {
            Ok(user) => Ok(CurrentSession { token, user }),
            // absent, expired and orphaned sessions all read as "not logged in"
            Err(AppError::SessionNotFound | AppError::SessionExpired | AppError::UserNotFound) => {
                warn!("invalid or expired session");
                Err(AppError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }
}
