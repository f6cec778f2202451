use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::{
    repo::{InMemorySessionStore, PgSessionStore, SessionStore},
    services::AuthService,
};
use crate::config::{AppConfig, SessionConfig};
use crate::users::{
    repo::{InMemoryUserStore, PgUserStore, UserStore},
    services::UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub users: UserService,
}

impl AppState {
    pub fn from_stores(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let timeout = config.store_timeout();
        let auth = AuthService::new(
            sessions.clone(),
            users.clone(),
            config.session_lifetime(),
            timeout,
        );
        let users = UserService::new(users, sessions, timeout);
        Self {
            config,
            auth,
            users,
        }
    }

    pub fn from_pool(db: PgPool, config: Arc<AppConfig>) -> Self {
        let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
        let sessions = Arc::new(PgSessionStore::new(db)) as Arc<dyn SessionStore>;
        Self::from_stores(config, users, sessions)
    }

    /// State backed by in-memory stores; nothing touches a database.
    pub fn in_memory() -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "memory://".into(),
            max_connections: 1,
            store_timeout_ms: 2000,
            session: SessionConfig {
                lifetime_hours: 24,
                sweep_interval_secs: 600,
            },
        });
        Self::from_stores(
            config,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemorySessionStore::new()),
        )
    }
}
