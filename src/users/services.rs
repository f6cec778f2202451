use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    password::{hash_password_async, verify_password_async},
    repo::SessionStore,
    services::log_store_error,
};
use crate::db::with_timeout;
use crate::error::{AppError, AppResult, StoreError};
use crate::users::{
    repo::UserStore,
    repo_types::{User, UserUpdate},
};

/// Registration, password change and user lookups.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    timeout: Duration,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            timeout,
        }
    }

    /// Create an account. New accounts start active.
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> AppResult<User> {
        let existing = with_timeout(self.timeout, self.users.get_by_email(email))
            .await
            .map_err(|e| log_store_error(e, "cannot get user by email"))?;
        if existing.is_some() {
            warn!("email already registered");
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = hash_password_async(password.to_owned()).await?;
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            password_hash,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        };

        // A concurrent registration can slip in between the check and the insert;
        // the unique index turns that into a conflict instead of an overwrite.
        let created = match with_timeout(self.timeout, self.users.create(&user)).await {
            Ok(u) => u,
            Err(StoreError::Conflict) => {
                warn!("email taken by concurrent registration");
                return Err(AppError::DuplicateEmail);
            }
            Err(e) => return Err(log_store_error(e, "cannot create user")),
        };
        info!(user_id = %created.id, "user registered");
        Ok(created)
    }

    /// Replace the password after checking the old one, then revoke every
    /// session of the user.
    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.get_by_id(user_id).await?;
        if !verify_password_async(old_password.to_owned(), user.password_hash).await {
            return Err(AppError::PasswordMismatch);
        }

        let hash = hash_password_async(new_password.to_owned()).await?;
        with_timeout(
            self.timeout,
            self.users.update(user_id, UserUpdate::password_hash(hash)),
        )
        .await
        .map_err(|e| log_store_error(e, "cannot update user"))?
        .ok_or(AppError::UserNotFound)?;

        let revoked = with_timeout(self.timeout, self.sessions.delete_by_user(user_id, &[]))
            .await
            .map_err(|e| log_store_error(e, "cannot revoke sessions"))?;
        info!(%user_id, revoked, "password changed");
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        with_timeout(self.timeout, self.users.get_by_id(id))
            .await
            .map_err(|e| log_store_error(e, "cannot get user by id"))?
            .ok_or(AppError::UserNotFound)
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        with_timeout(self.timeout, self.users.get_by_email(email))
            .await
            .map_err(|e| log_store_error(e, "cannot get user by email"))?
            .ok_or(AppError::UserNotFound)
    }

    /// Apply a partial update. A taken email surfaces as [`AppError::DuplicateEmail`].
    /// Deactivating an account revokes all of its sessions.
    pub async fn update(&self, id: Uuid, update: UserUpdate) -> AppResult<User> {
        let deactivating = update.is_active == Some(false);
        let user = match with_timeout(self.timeout, self.users.update(id, update)).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AppError::UserNotFound),
            Err(StoreError::Conflict) => return Err(AppError::DuplicateEmail),
            Err(e) => return Err(log_store_error(e, "cannot update user")),
        };

        if deactivating {
            let revoked = with_timeout(self.timeout, self.sessions.delete_by_user(id, &[]))
                .await
                .map_err(|e| log_store_error(e, "cannot revoke sessions"))?;
            info!(user_id = %id, revoked, "user deactivated");
        }
        Ok(user)
    }

    /// Remove a user together with all of their sessions.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        with_timeout(self.timeout, self.sessions.delete_by_user(id, &[]))
            .await
            .map_err(|e| log_store_error(e, "cannot revoke sessions"))?;
        let removed = with_timeout(self.timeout, self.users.delete(id))
            .await
            .map_err(|e| log_store_error(e, "cannot delete user"))?;
        if !removed {
            return Err(AppError::UserNotFound);
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}
