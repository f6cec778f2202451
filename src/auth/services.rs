use std::{sync::Arc, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    password::{decoy_verify, verify_password_async},
    repo::SessionStore,
    repo_types::Session,
    token::generate_token,
};
use crate::db::with_timeout;
use crate::error::{AppError, AppResult, StoreError};
use crate::users::{repo::UserStore, repo_types::User};

/// Minimum length accepted for a new password at the HTTP boundary.
pub(crate) const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Login, logout and session resolution. Owns the session lifetime policy.
#[derive(Clone)]
pub struct AuthService {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    session_lifetime: time::Duration,
    timeout: Duration,
}

impl AuthService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        session_lifetime: time::Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            users,
            session_lifetime,
            timeout,
        }
    }

    pub fn session_lifetime(&self) -> time::Duration {
        self.session_lifetime
    }

    /// Verify credentials and mint a session. Unknown email, inactive account
    /// and wrong password are all reported as [`AppError::InvalidCredentials`].
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let user = with_timeout(self.timeout, self.users.get_by_email(email))
            .await
            .map_err(|e| log_store_error(e, "cannot get user by email"))?;

        let Some(user) = user else {
            decoy_verify(password.to_owned()).await?;
            warn!("login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password_async(password.to_owned(), user.password_hash.clone()).await {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = %user.id, "login on inactive account");
            return Err(AppError::InvalidCredentials);
        }

        let session = self.issue_session(user.id).await?;
        self.confirm_unchanged(&user, &session).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(session)
    }

    /// Re-read the user after the session is stored. If the password or the
    /// active flag moved since the credentials were checked, drop the session.
    async fn confirm_unchanged(&self, checked: &User, session: &Session) -> AppResult<()> {
        let current = with_timeout(self.timeout, self.users.get_by_id(checked.id))
            .await
            .map_err(|e| log_store_error(e, "cannot get user by id"))?;
        let unchanged = current
            .is_some_and(|u| u.is_active && u.password_hash == checked.password_hash);
        if unchanged {
            return Ok(());
        }

        warn!(user_id = %checked.id, "credentials changed during login, dropping session");
        with_timeout(self.timeout, self.sessions.delete(&session.id))
            .await
            .map_err(|e| log_store_error(e, "unable to delete session"))?;
        Err(AppError::InvalidCredentials)
    }

    /// Mint and persist a fresh session for `user_id`.
    pub async fn issue_session(&self, user_id: Uuid) -> AppResult<Session> {
        let token = generate_token().map_err(|e| {
            error!(error = %e, "unable to generate session id");
            AppError::from(e)
        })?;
        let session = Session {
            id: token,
            user_id,
            expires_on: OffsetDateTime::now_utc() + self.session_lifetime,
        };
        let created = with_timeout(self.timeout, self.sessions.create(&session))
            .await
            .map_err(|e| log_store_error(e, "unable to create session"))?;
        debug!(%user_id, expires_on = %created.expires_on, "session issued");
        Ok(created)
    }

    /// Session lookup that enforces expiry. Expired rows are deleted on sight.
    pub async fn get_session(&self, token: &str) -> AppResult<Session> {
        let session = with_timeout(self.timeout, self.sessions.get(token))
            .await
            .map_err(|e| log_store_error(e, "unable to get session by id"))?
            .ok_or(AppError::SessionNotFound)?;

        if session.is_expired_at(OffsetDateTime::now_utc()) {
            debug!(user_id = %session.user_id, "session expired, purging");
            if let Err(e) = with_timeout(self.timeout, self.sessions.delete(token)).await {
                warn!(error = %e, "unable to purge expired session");
            }
            return Err(AppError::SessionExpired);
        }
        Ok(session)
    }

    /// Resolve a bearer token to its owning user. A deactivated owner is
    /// reported as [`AppError::UserNotFound`], same as a deleted one.
    pub async fn resolve(&self, token: &str) -> AppResult<User> {
        let session = self.get_session(token).await?;
        let user = with_timeout(self.timeout, self.users.get_by_id(session.user_id))
            .await
            .map_err(|e| log_store_error(e, "cannot get user by id"))?;
        match user {
            Some(user) if user.is_active => Ok(user),
            Some(user) => {
                warn!(user_id = %user.id, "session of an inactive user");
                Err(AppError::UserNotFound)
            }
            None => {
                warn!(user_id = %session.user_id, "session points at a missing user");
                Err(AppError::UserNotFound)
            }
        }
    }

    pub async fn list_sessions(&self, user_id: Uuid) -> AppResult<Vec<Session>> {
        let now = OffsetDateTime::now_utc();
        let sessions = with_timeout(self.timeout, self.sessions.list_by_user(user_id))
            .await
            .map_err(|e| log_store_error(e, "unable to get sessions"))?;
        Ok(sessions
            .into_iter()
            .filter(|s| !s.is_expired_at(now))
            .collect())
    }

    /// Revoke one session. Unknown tokens are accepted silently.
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        with_timeout(self.timeout, self.sessions.delete(token))
            .await
            .map_err(|e| log_store_error(e, "unable to delete session"))?;
        Ok(())
    }

    /// Revoke every session of `user_id` except the tokens in `except`.
    #[instrument(skip(self, except))]
    pub async fn revoke_all_for_user(&self, user_id: Uuid, except: &[String]) -> AppResult<u64> {
        let removed = with_timeout(self.timeout, self.sessions.delete_by_user(user_id, except))
            .await
            .map_err(|e| log_store_error(e, "unable to delete sessions by user id"))?;
        info!(%user_id, removed, kept = except.len(), "sessions revoked");
        Ok(removed)
    }

    /// Delete sessions that expired before now.
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        let now = OffsetDateTime::now_utc();
        let removed = with_timeout(self.timeout, self.sessions.delete_expired(now))
            .await
            .map_err(|e| log_store_error(e, "unable to delete expired sessions"))?;
        Ok(removed)
    }
}

pub(crate) fn log_store_error(e: StoreError, what: &'static str) -> AppError {
    error!(error = %e, "{what}");
    AppError::from(e)
}
