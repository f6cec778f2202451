use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{config::AppConfig, error::StoreError};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.store_timeout())
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

/// Runs a store call under a time budget. An elapsed budget is reported as
/// [`StoreError::Timeout`]; the call is dropped, not retried.
pub async fn with_timeout<T, F>(budget: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| StoreError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn elapsed_budget_is_a_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(1)
        };
        let res = with_timeout(Duration::from_millis(10), slow).await;
        assert!(matches!(res, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let res = with_timeout(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
