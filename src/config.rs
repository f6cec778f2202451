use std::{net::SocketAddr, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;

/// Sessions longer than a year are refused.
const MAX_LIFETIME_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub lifetime_hours: i64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub store_timeout_ms: u64,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let session = SessionConfig {
            lifetime_hours: env_or("SESSION_LIFETIME_HOURS", 24),
            sweep_interval_secs: env_or("SESSION_SWEEP_INTERVAL_SECS", 600),
        };
        let config = Self {
            host: env_or("APP_HOST", "0.0.0.0".to_string()),
            port: env_or("APP_PORT", 8080),
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", 3000),
            session,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let hours = self.session.lifetime_hours;
        if !(1..=MAX_LIFETIME_HOURS).contains(&hours) {
            bail!("SESSION_LIFETIME_HOURS must be between 1 and {MAX_LIFETIME_HOURS}, got {hours}");
        }
        if self.session.sweep_interval_secs == 0 {
            bail!("SESSION_SWEEP_INTERVAL_SECS must be greater than zero");
        }
        if self.store_timeout_ms == 0 {
            bail!("STORE_TIMEOUT_MS must be greater than zero");
        }
        if self.max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be greater than zero");
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid APP_HOST {:?}", self.host))
    }

    pub fn session_lifetime(&self) -> time::Duration {
        time::Duration::hours(self.session.lifetime_hours)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_secs)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            database_url: "postgres://localhost/test".into(),
            max_connections: 5,
            store_timeout_ms: 3000,
            session: SessionConfig {
                lifetime_hours: 24,
                sweep_interval_secs: 600,
            },
        }
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = config();
        cfg.validate().unwrap();
        assert_eq!(cfg.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let mut cfg = config();
        cfg.session.sweep_interval_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("SESSION_SWEEP_INTERVAL_SECS"));
    }

    #[test]
    fn lifetime_out_of_range_is_rejected() {
        for hours in [0, -5, MAX_LIFETIME_HOURS + 1, i64::MAX] {
            let mut cfg = config();
            cfg.session.lifetime_hours = hours;
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("SESSION_LIFETIME_HOURS"), "{hours}");
        }
    }

    #[test]
    fn zero_store_timeout_is_rejected() {
        let mut cfg = config();
        cfg.store_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_host_is_rejected() {
        let mut cfg = config();
        cfg.host = "not a host".into();
        assert!(cfg.validate().is_err());
    }
}
