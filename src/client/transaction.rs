//! Interactive transactions

use std::time::Duration;

use crate::db::Executor;
use crate::error::{OrmError, Result};
use crate::orm::Engine;

/// SQL isolation levels. SQLite only provides serializable transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub(crate) fn check_supported(level: Option<IsolationLevel>) -> Result<()> {
        match level {
            None | Some(IsolationLevel::Serializable) => Ok(()),
            Some(other) => Err(OrmError::UnsupportedIsolationLevel(other)),
        }
    }
}

/// Limits for `Client::transaction`
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOptions {
    /// How long to wait for a connection before giving up
    pub max_wait: Duration,
    /// How long the callback may run before the transaction is rolled back
    pub timeout: Duration,
    pub isolation_level: Option<IsolationLevel>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(2000),
            timeout: Duration::from_millis(5000),
            isolation_level: None,
        }
    }
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }
}

/// Handle passed to a `Client::transaction` callback.
///
/// Every operation runs on the transaction's connection. It cannot start a
/// nested transaction, and once the transaction has committed or rolled back
/// all calls fail with `TransactionClosed`.
#[derive(Clone)]
pub struct TransactionClient {
    engine: Engine,
    executor: Executor,
}

impl TransactionClient {
    pub(crate) fn new(engine: Engine, executor: Executor) -> Self {
        Self { engine, executor }
    }

    scoped_operations!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_options() {
        let options = TransactionOptions::default();
        assert_eq!(options.max_wait, Duration::from_secs(2));
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.isolation_level, None);
    }

    #[test]
    fn test_only_serializable_is_supported() {
        assert!(IsolationLevel::check_supported(None).is_ok());
        assert!(IsolationLevel::check_supported(Some(IsolationLevel::Serializable)).is_ok());
        assert_matches!(
            IsolationLevel::check_supported(Some(IsolationLevel::ReadCommitted)),
            Err(OrmError::UnsupportedIsolationLevel(IsolationLevel::ReadCommitted))
        );
    }
}
