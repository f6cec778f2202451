use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::Session;
use crate::error::StoreError;

/// Persistence for login sessions keyed by token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session, StoreError>;
    async fn get(&self, token: &str) -> Result<Option<Session>, StoreError>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Session>, StoreError>;
    /// Deleting an absent token is not an error.
    async fn delete(&self, token: &str) -> Result<(), StoreError>;
    /// Removes every session of `user_id` whose token is not in `except`, as a
    /// single atomic operation. Returns the number removed.
    async fn delete_by_user(&self, user_id: Uuid, except: &[String]) -> Result<u64, StoreError>;
    /// Removes sessions with `expires_on < now`.
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &Session) -> Result<Session, StoreError> {
        let created = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO auth_sessions (id, user_id, expires_on)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, expires_on
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_on)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn get(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"SELECT id, user_id, expires_on FROM auth_sessions WHERE id = $1"#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(session)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, expires_on
              FROM auth_sessions
             WHERE user_id = $1
             ORDER BY expires_on DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid, except: &[String]) -> Result<u64, StoreError> {
        // The exclusion list travels as one text[] parameter.
        let res = sqlx::query(
            r#"
            DELETE FROM auth_sessions
             WHERE user_id = $1
               AND NOT (id = ANY($2))
            "#,
        )
        .bind(user_id)
        .bind(except)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM auth_sessions WHERE expires_on < $1")
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}

/// Map-backed store with the same contract as [`PgSessionStore`]. Every
/// mutation holds the write lock for its whole duration.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict);
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(session.clone())
    }

    async fn get(&self, token: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let mut rows: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.expires_on.cmp(&a.expires_on));
        Ok(rows)
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid, except: &[String]) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|token, s| s.user_id != user_id || except.contains(token));
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_on >= now);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    fn session(token: &str, user_id: Uuid, ttl: Duration) -> Session {
        Session {
            id: token.into(),
            user_id,
            expires_on: OffsetDateTime::now_utc() + ttl,
        }
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemorySessionStore::new();
        let user = Uuid::new_v4();
        store.create(&session("t1", user, Duration::hours(1))).await.unwrap();
        store.delete("t1").await.unwrap();
        store.delete("t1").await.unwrap();
        assert!(store.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_user_honours_exclusions_and_other_users() {
        let store = InMemorySessionStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for t in ["a1", "a2", "a3"] {
            store.create(&session(t, alice, Duration::hours(1))).await.unwrap();
        }
        store.create(&session("b1", bob, Duration::hours(1))).await.unwrap();

        let removed = store.delete_by_user(alice, &["a2".to_string()]).await.unwrap();

        assert_eq!(removed, 2);
        let left: Vec<_> = store
            .list_by_user(alice)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(left, vec!["a2".to_string()]);
        assert!(store.get("b1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_expired_keeps_live_sessions() {
        let store = InMemorySessionStore::new();
        let user = Uuid::new_v4();
        store.create(&session("old", user, Duration::hours(-1))).await.unwrap();
        store.create(&session("new", user, Duration::hours(1))).await.unwrap();

        let removed = store.delete_expired(OffsetDateTime::now_utc()).await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.get("old").await.unwrap().is_none());
        assert!(store.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_token_conflicts() {
        let store = InMemorySessionStore::new();
        let user = Uuid::new_v4();
        store.create(&session("t", user, Duration::hours(1))).await.unwrap();
        let err = store.create(&session("t", user, Duration::hours(1))).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }
}
