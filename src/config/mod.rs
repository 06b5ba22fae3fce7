//! Configuration loaded from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::client::TransactionOptions;
use crate::db::DatabaseConfig;
use crate::logging::{LogConfig, LogFormat};

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL
    pub database_url: String,

    /// Maximum pooled connections
    pub database_max_connections: u32,

    /// How long to keep retrying the initial connection
    pub database_connect_timeout: Duration,

    /// Default wait for a transaction to start
    pub transaction_max_wait: Duration,

    /// Default limit on an interactive transaction's callback
    pub transaction_timeout: Duration,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        let database = DatabaseConfig::default();
        let transaction = TransactionOptions::default();
        Self {
            database_url: database.url,
            database_max_connections: database.max_connections,
            database_connect_timeout: database.connect_timeout,
            transaction_max_wait: transaction.max_wait,
            transaction_timeout: transaction.timeout,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);
        let database_max_connections = parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")?
            .unwrap_or(defaults.database_max_connections);
        let database_connect_timeout = parse_var(&lookup, "DATABASE_CONNECT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.database_connect_timeout);
        let transaction_max_wait = parse_var(&lookup, "TRANSACTION_MAX_WAIT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.transaction_max_wait);
        let transaction_timeout = parse_var(&lookup, "TRANSACTION_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.transaction_timeout);
        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            database_connect_timeout,
            transaction_max_wait,
            transaction_timeout,
            log_format,
        })
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database_url.clone(),
            max_connections: self.database_max_connections,
            connect_timeout: self.database_connect_timeout,
        }
    }

    pub fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions::new()
            .max_wait(self.transaction_max_wait)
            .timeout(self.transaction_timeout)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            ..Default::default()
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} must be a number, got `{raw}`"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, "sqlite:./data/roadmap.db");
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.database_connect_timeout, Duration::from_secs(30));
        assert_eq!(config.transaction_max_wait, Duration::from_millis(2000));
        assert_eq!(config.transaction_timeout, Duration::from_millis(5000));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("DATABASE_CONNECT_TIMEOUT_SECS", "3"),
            ("TRANSACTION_TIMEOUT_MS", "250"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(config.database_config().url, "sqlite::memory:");
        assert_eq!(config.database_config().max_connections, 4);
        assert_eq!(config.database_config().connect_timeout, Duration::from_secs(3));
        assert_eq!(config.transaction_options().timeout, Duration::from_millis(250));
        assert_eq!(config.transaction_options().max_wait, Duration::from_millis(2000));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = Config::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "lots")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));
    }

    #[test]
    fn test_invalid_log_format() {
        assert!(Config::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }
}
