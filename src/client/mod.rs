//! Client facade
//!
//! `Client` owns the pool and hands out one `Delegate` per entity. It is cheap
//! to clone; every call acquires its own pooled connection and returns it when
//! the call finishes.
//!
//! ```ignore
//! let client = Client::connect(&DatabaseConfig::new("sqlite:./data/roadmap.db")).await?;
//! let user = client
//!     .user()
//!     .find_unique(WhereUniqueInput::new("email", "ada@example.com"))
//!     .await?;
//! ```

/// Delegate accessors and raw queries shared by `Client` and
/// `TransactionClient`. Expects `engine: Engine` and `executor: Executor`
/// fields on the implementing type.
macro_rules! scoped_operations {
    () => {
        /// Delegate for any entity type
        pub fn delegate<M: $crate::entities::Entity>(&self) -> $crate::client::Delegate<M> {
            $crate::client::Delegate::new(self.engine, self.executor.clone())
        }

        scoped_operations!(@delegates
            user => User,
            session => Session,
            account => Account,
            verification => Verification,
            project => Project,
            chat_history => ChatHistory,
            message => Message,
            road_map => RoadMap,
            node => Node,
            code_snippet => CodeSnippet,
            model => Model,
        );

        /// Run a parameterized statement; returns the affected row count
        pub async fn execute_raw(&self, sql: &$crate::orm::Sql) -> $crate::error::Result<u64> {
            let mut guard = self.executor.acquire().await?;
            $crate::orm::raw::execute_raw(guard.connection()?, sql).await
        }

        /// Run a parameterized query and decode rows by column name
        pub async fn query_raw(
            &self,
            sql: &$crate::orm::Sql,
        ) -> $crate::error::Result<Vec<$crate::orm::Record>> {
            let mut guard = self.executor.acquire().await?;
            $crate::orm::raw::query_raw(guard.connection()?, sql).await
        }

        /// Run a caller-built statement.
        ///
        /// `text` is sent as is: never interpolate untrusted input into it,
        /// pass it through `params` instead.
        pub async fn execute_raw_unsafe(
            &self,
            text: &str,
            params: Vec<$crate::orm::Value>,
        ) -> $crate::error::Result<u64> {
            let mut guard = self.executor.acquire().await?;
            $crate::orm::raw::execute_raw_unsafe(guard.connection()?, text, params).await
        }

        /// Query counterpart of `execute_raw_unsafe`, with the same caveat.
        pub async fn query_raw_unsafe(
            &self,
            text: &str,
            params: Vec<$crate::orm::Value>,
        ) -> $crate::error::Result<Vec<$crate::orm::Record>> {
            let mut guard = self.executor.acquire().await?;
            $crate::orm::raw::query_raw_unsafe(guard.connection()?, text, params).await
        }
    };
    (@delegates $($method:ident => $entity:ident),* $(,)?) => {
        $(
            pub fn $method(&self) -> $crate::client::Delegate<$crate::entities::$entity> {
                self.delegate::<$crate::entities::$entity>()
            }
        )*
    };
}

mod delegate;
mod transaction;

use std::future::Future;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::{Database, DatabaseConfig, Executor, SchemaSyncResult, SharedTransaction};
use crate::error::{OrmError, Result};
use crate::orm::{Engine, Operation, OperationOutput};
use crate::schema::SchemaRegistry;

pub use delegate::Delegate;
pub use transaction::{IsolationLevel, TransactionClient, TransactionOptions};

/// Pool-backed client
#[derive(Clone)]
pub struct Client {
    database: Database,
    engine: Engine,
    executor: Executor,
}

impl Client {
    /// Connect once, failing fast if the database cannot be opened
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::from_database(Database::connect(config).await?))
    }

    /// Connect, retrying with backoff for up to `config.connect_timeout`
    pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::from_database(
            Database::connect_with_retry(config).await?,
        ))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self::from_database(Database::new(pool))
    }

    fn from_database(database: Database) -> Self {
        let executor = Executor::Pool(database.pool().clone());
        Self {
            database,
            engine: Engine::new(SchemaRegistry::global()),
            executor,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.database.pool()
    }

    /// Create missing tables, columns and indexes for every model
    pub async fn push_schema(&self) -> SchemaSyncResult {
        crate::db::push_schema(self.database.pool(), self.engine.registry()).await
    }

    /// Close the pool; later calls fail
    pub async fn disconnect(&self) {
        self.database.close().await;
    }

    scoped_operations!();

    /// Run independent operations atomically, in order.
    ///
    /// Any failure rolls back every earlier operation in the batch.
    pub async fn transaction_batch(
        &self,
        operations: Vec<Operation>,
    ) -> Result<Vec<OperationOutput>> {
        let mut tx = self.database.pool().begin().await?;
        let mut outputs = Vec::with_capacity(operations.len());
        for (index, operation) in operations.iter().enumerate() {
            match self.engine.execute(&mut tx, operation).await {
                Ok(output) => outputs.push(output),
                Err(err) => {
                    info!(
                        index,
                        model = %operation.model,
                        action = operation.action.name(),
                        error = %err,
                        "Batch transaction rolled back"
                    );
                    return Err(err);
                }
            }
        }
        tx.commit().await?;
        info!(operations = outputs.len(), "Batch transaction committed");
        Ok(outputs)
    }

    /// Run `body` inside an interactive transaction.
    ///
    /// The transaction commits when `body` returns `Ok` and rolls back when it
    /// returns an error (which is passed through unchanged) or exceeds
    /// `options.timeout`.
    pub async fn transaction<F, Fut, T>(&self, options: TransactionOptions, body: F) -> Result<T>
    where
        F: FnOnce(TransactionClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        IsolationLevel::check_supported(options.isolation_level)?;

        let tx = match tokio::time::timeout(options.max_wait, self.database.pool().begin()).await
        {
            Ok(tx) => tx?,
            Err(_) => {
                return Err(OrmError::TransactionStartTimeout {
                    max_wait_ms: options.max_wait.as_millis() as u64,
                });
            }
        };

        let shared: SharedTransaction = Arc::new(Mutex::new(Some(tx)));
        let client = TransactionClient::new(self.engine, Executor::Transaction(shared.clone()));
        let outcome = tokio::time::timeout(options.timeout, body(client)).await;

        // Closing the slot turns every outstanding TransactionClient into a
        // TransactionClosed error.
        let Some(tx) = shared.lock().await.take() else {
            return Err(OrmError::TransactionClosed);
        };

        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await?;
                info!("Transaction committed");
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                info!(error = %err, "Transaction rolled back");
                Err(err)
            }
            Err(_) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                let timeout_ms = options.timeout.as_millis() as u64;
                warn!(timeout_ms, "Transaction timed out and was rolled back");
                Err(OrmError::TransactionTimeout { timeout_ms })
            }
        }
    }
}
