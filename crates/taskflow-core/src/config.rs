//! Configuration module
//!
//! Runtime settings are read from the environment (and an optional `.env`
//! file). Hop bounds are compile-time constants in [`crate::constants`].

use std::env;
use std::time::Duration;

use crate::constants::{DEFAULT_LOCK_SWEEP_INTERVAL_SECS, DEFAULT_LOCK_TTL_SECS};

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub lock_ttl_secs: u64,
    pub lock_sweep_interval_secs: u64,
    /// Cross-department fallback used when a company record cannot be found.
    pub default_allow_cross_dept_comm: bool,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            environment: "development".to_string(),
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            lock_sweep_interval_secs: DEFAULT_LOCK_SWEEP_INTERVAL_SECS,
            default_allow_cross_dept_comm: false,
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_timeout_seconds: parse_var("DB_TIMEOUT_SECONDS", defaults.db_timeout_seconds)?,
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            lock_ttl_secs: parse_var("LOCK_TTL_SECS", defaults.lock_ttl_secs)?,
            lock_sweep_interval_secs: parse_var(
                "LOCK_SWEEP_INTERVAL_SECS",
                defaults.lock_sweep_interval_secs,
            )?,
            default_allow_cross_dept_comm: parse_bool(
                "DEFAULT_ALLOW_CROSS_DEPT_COMM",
                defaults.default_allow_cross_dept_comm,
            ),
            log_json: parse_bool("LOG_JSON", defaults.log_json),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.db_max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be greater than 0");
        }
        if self.lock_ttl_secs == 0 {
            anyhow::bail!("LOCK_TTL_SECS must be greater than 0");
        }
        if self.lock_sweep_interval_secs == 0 {
            anyhow::bail!("LOCK_SWEEP_INTERVAL_SECS must be greater than 0");
        }
        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                anyhow::bail!("DATABASE_URL must be a postgres connection string");
            }
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn lock_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.lock_sweep_interval_secs)
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        _ => Ok(default),
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_ttl(), Duration::from_secs(30));
        assert!(!config.is_production());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = Config {
            lock_ttl_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_postgres_url() {
        let config = Config {
            database_url: Some("mysql://localhost/db".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_production() {
        let config = Config {
            environment: "PROD".to_string(),
            ..Config::default()
        };
        assert!(config.is_production());
    }
}
