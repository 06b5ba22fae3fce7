//! Database connection and executors

pub mod retry;
pub mod schema_sync;
pub mod sqlite_helpers;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::error::{OrmError, Result};
use retry::{RetryPolicy, retry_until};

pub use schema_sync::{SchemaSyncResult, push_schema};

/// Connection settings for the SQLite pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection URL (e.g. `sqlite:./data/roadmap.db` or `sqlite::memory:`)
    pub url: String,
    pub max_connections: u32,
    /// How long to keep retrying the initial connection
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:./data/roadmap.db".to_string(),
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Database wrapper providing connection pool access
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the pool once; the file is created when missing and foreign keys
    /// are enforced on every connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| OrmError::invalid(format!("invalid database url `{}`: {e}", config.url)))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(OrmError::Connection)?;
        info!(
            url = %config.url,
            max_connections = config.max_connections,
            "Connected to database"
        );
        Ok(Self { pool })
    }

    /// Connect, retrying with backoff until `connect_timeout` has elapsed
    pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<Self> {
        retry_until(
            "database connect",
            &RetryPolicy::until(config.connect_timeout),
            |err: &OrmError| matches!(err, OrmError::Connection(_)) || err.is_retryable(),
            || Self::connect(config),
        )
        .await
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Shared handle to an open transaction; `None` once it has finished.
pub(crate) type SharedTransaction = Arc<Mutex<Option<Transaction<'static, Sqlite>>>>;

/// Where an operation runs: a fresh pooled connection per call, or the
/// connection of an interactive transaction.
#[derive(Clone)]
pub(crate) enum Executor {
    Pool(SqlitePool),
    Transaction(SharedTransaction),
}

impl Executor {
    pub async fn acquire(&self) -> Result<ConnectionGuard<'_>> {
        match self {
            Executor::Pool(pool) => Ok(ConnectionGuard::Pooled(pool.acquire().await?)),
            Executor::Transaction(tx) => Ok(ConnectionGuard::Transaction(tx.lock().await)),
        }
    }
}

/// Connection held for the duration of one operation; dropping it returns
/// the connection to the pool or releases the transaction lock.
pub(crate) enum ConnectionGuard<'a> {
    Pooled(PoolConnection<Sqlite>),
    Transaction(MutexGuard<'a, Option<Transaction<'static, Sqlite>>>),
}

impl ConnectionGuard<'_> {
    pub fn connection(&mut self) -> Result<&mut SqliteConnection> {
        match self {
            ConnectionGuard::Pooled(conn) => Ok(&mut **conn),
            ConnectionGuard::Transaction(guard) => guard
                .as_mut()
                .map(|tx| &mut **tx)
                .ok_or(OrmError::TransactionClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite:./data/roadmap.db");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_closed_transaction_guard() {
        let executor = Executor::Transaction(Arc::new(Mutex::new(None)));
        let mut guard = executor.acquire().await.unwrap();
        assert_matches!(guard.connection(), Err(OrmError::TransactionClosed));
    }

    #[tokio::test]
    async fn test_bad_url_is_not_retried() {
        let config = DatabaseConfig {
            connect_timeout: Duration::from_secs(30),
            ..DatabaseConfig::new("sqlite:test.db?mode=bogus")
        };
        let started = std::time::Instant::now();
        let result = Database::connect_with_retry(&config).await;
        assert_matches!(result, Err(OrmError::InvalidArgument(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
