use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::users::repo_types::{User, UserUpdate};

/// Persistence for user records. Email is unique; a duplicate insert or an
/// update onto a taken email fails with [`StoreError::Conflict`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &User) -> Result<User, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Returns `None` when no user has `id`.
    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<Option<User>, StoreError>;
    /// Returns whether a row was removed. Sessions go with it (FK cascade).
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &User) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, is_active, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<Option<User>, StoreError> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email         = COALESCE($2, email),
                   password_hash = COALESCE($3, password_hash),
                   is_active     = COALESCE($4, is_active)
             WHERE id = $1
            RETURNING id, email, password_hash, is_active, created_at
            "#,
        )
        .bind(id)
        .bind(update.email)
        .bind(update.password_hash)
        .bind(update.is_active)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// Map-backed store with the same contract as [`PgUserStore`].
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) || users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict);
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        if let Some(email) = &update.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Conflict);
            }
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        update.apply(user);
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = InMemoryUserStore::new();
        store.create(&user("a@x.com")).await.unwrap();
        let err = store.create(&user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() {
        let store = InMemoryUserStore::new();
        store.create(&user("A@x.com")).await.unwrap();
        assert!(store.get_by_email("a@x.com").await.unwrap().is_none());
        assert!(store.get_by_email("A@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_touches_only_given_fields() {
        let store = InMemoryUserStore::new();
        let original = store.create(&user("a@x.com")).await.unwrap();

        let updated = store
            .update(original.id, UserUpdate::password_hash("$argon2id$new".into()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.password_hash, "$argon2id$new");
        assert_eq!(updated.email, original.email);
        assert_eq!(updated.is_active, original.is_active);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.id, original.id);
    }

    #[tokio::test]
    async fn update_onto_taken_email_conflicts() {
        let store = InMemoryUserStore::new();
        store.create(&user("a@x.com")).await.unwrap();
        let b = store.create(&user("b@x.com")).await.unwrap();
        let err = store
            .update(
                b.id,
                UserUpdate {
                    email: Some("a@x.com".into()),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_user() {
        let store = InMemoryUserStore::new();
        let id = Uuid::new_v4();
        assert!(store.update(id, UserUpdate::default()).await.unwrap().is_none());
        assert!(!store.delete(id).await.unwrap());
    }
}
