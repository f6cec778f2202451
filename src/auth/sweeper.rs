use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::auth::services::AuthService;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically deletes expired sessions. Failures are logged and the next
/// tick tries again. Intervals under a second are raised to one second.
pub fn spawn_sweeper(auth: AuthService, every: Duration) -> JoinHandle<()> {
    let every = if every < MIN_INTERVAL {
        warn!(requested_ms = every.as_millis() as u64, "sweep interval too short, using 1s");
        MIN_INTERVAL
    } else {
        every
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "session sweeper started");
        loop {
            ticker.tick().await;
            match auth.sweep_expired().await {
                Ok(0) => debug!("no expired sessions"),
                Ok(removed) => info!(removed, "expired sessions swept"),
                Err(e) => error!(error = %e, "session sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::auth::{
        repo::{InMemorySessionStore, SessionStore},
        repo_types::Session,
    };
    use crate::users::repo::InMemoryUserStore;

    #[tokio::test]
    async fn sweeper_purges_in_background() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let auth = AuthService::new(
            sessions.clone(),
            Arc::new(InMemoryUserStore::new()),
            time::Duration::hours(1),
            Duration::from_secs(1),
        );
        sessions
            .create(&Session {
                id: "stale".into(),
                user_id: Uuid::new_v4(),
                expires_on: OffsetDateTime::now_utc() - time::Duration::minutes(5),
            })
            .await
            .unwrap();

        let handle = spawn_sweeper(auth, Duration::from_secs(1));
        for _ in 0..100 {
            if sessions.get("stale").await.unwrap().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(sessions.get("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_interval_keeps_the_task_alive() {
        let auth = AuthService::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryUserStore::new()),
            time::Duration::hours(1),
            Duration::from_secs(1),
        );

        let handle = spawn_sweeper(auth, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!handle.is_finished());
        handle.abort();
    }
}
