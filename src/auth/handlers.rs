use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        cookies::{clear_session_cookie, read_session_cookie, session_cookie},
        dto::{LoginRequest, LoginResponse, RegisterRequest, RevokedResponse, SessionView},
        extractors::CurrentSession,
        services::{is_valid_email, MIN_PASSWORD_LEN},
    },
    error::{AppError, AppResult},
    state::AppState,
    users::dto::PublicUser,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(register))
        .route("/auth/sign-in", post(login))
        .route("/auth/sign-out", post(logout))
        .route("/auth/sign-out-others", post(logout_others))
        .route("/auth/sessions", get(list_sessions))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    payload.email = payload.email.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::Validation("Password too short".into()));
    }

    let user = state.users.register(&payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    payload.email = payload.email.trim().to_string();

    let session = state.auth.login(&payload.email, &payload.password).await?;
    let user = state.users.get_by_id(session.user_id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(&session));
    Ok((
        headers,
        Json(LoginResponse {
            user: user.into(),
            expires_on: session.expires_on,
        }),
    ))
}

/// Drops the session named by the cookie, if any, and clears the cookie.
#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<(HeaderMap, StatusCode)> {
    if let Some(token) = read_session_cookie(&headers) {
        state.auth.logout(&token).await?;
        info!("user logged out");
    }
    let mut out = HeaderMap::new();
    out.insert(header::SET_COOKIE, clear_session_cookie());
    Ok((out, StatusCode::OK))
}

#[instrument(skip(state, current))]
pub async fn logout_others(
    State(state): State<AppState>,
    current: CurrentSession,
) -> AppResult<Json<RevokedResponse>> {
    let revoked = state
        .auth
        .revoke_all_for_user(current.user.id, std::slice::from_ref(&current.token))
        .await?;
    Ok(Json(RevokedResponse { revoked }))
}

#[instrument(skip(state, current))]
pub async fn list_sessions(
    State(state): State<AppState>,
    current: CurrentSession,
) -> AppResult<Json<Vec<SessionView>>> {
    let sessions = state.auth.list_sessions(current.user.id).await?;
    Ok(Json(
        sessions
            .iter()
            .map(|s| SessionView::new(s, &current.token))
            .collect(),
    ))
}
