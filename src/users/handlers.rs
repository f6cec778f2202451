use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        cookies::{clear_session_cookie, session_cookie},
        extractors::CurrentSession,
        services::{is_valid_email, MIN_PASSWORD_LEN},
    },
    error::{AppError, AppResult},
    state::AppState,
    users::dto::{ChangePasswordRequest, PublicUser, UpdateUserRequest},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/users/me/password", put(change_password))
}

#[instrument(skip(current))]
pub async fn get_me(current: CurrentSession) -> Json<PublicUser> {
    Json(current.user.into())
}

#[instrument(skip(state, current, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(mut payload): Json<UpdateUserRequest>,
) -> AppResult<Json<PublicUser>> {
    if let Some(email) = payload.email.as_mut() {
        *email = email.trim().to_string();
        if !is_valid_email(email.as_str()) {
            warn!(email = %email, "invalid email");
            return Err(AppError::Validation("Invalid email".into()));
        }
    }
    let user = state.users.update(current.user.id, payload.into()).await?;
    Ok(Json(user.into()))
}

/// Changes the password. Every session of the user is revoked, and the caller
/// gets a fresh one in place of the cookie it came with.
#[instrument(skip(state, current, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<(HeaderMap, StatusCode)> {
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::Validation("Password too short".into()));
    }
    let user_id = current.user.id;
    state
        .users
        .change_password(user_id, &payload.old_password, &payload.new_password)
        .await?;
    let session = state.auth.issue_session(user_id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(&session));
    Ok((headers, StatusCode::NO_CONTENT))
}

#[instrument(skip(state, current))]
pub async fn delete_me(
    State(state): State<AppState>,
    current: CurrentSession,
) -> AppResult<(HeaderMap, StatusCode)> {
    state.users.delete(current.user.id).await?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, clear_session_cookie());
    Ok((headers, StatusCode::NO_CONTENT))
}
