//! Error taxonomy for the data-access client
//!
//! Validation errors are raised before any SQL reaches the engine. Engine
//! errors keep enough structure (model, fields, a stable code) for callers to
//! branch on them instead of parsing messages.

use thiserror::Error;

use crate::client::IsolationLevel;
use crate::schema::SchemaRegistry;

/// Result alias used across the crate.
pub type Result<T, E = OrmError> = std::result::Result<T, E>;

/// Broad class of an error, used to decide how a caller should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request was malformed; detected before any round-trip.
    Validation,
    /// The engine rejected an otherwise well-formed request.
    Request,
    /// Transaction lifecycle failure (start timeout, body timeout, closed).
    Transaction,
    /// The engine could not be reached or configured.
    Initialization,
    /// The engine worker died underneath the client.
    Engine,
}

#[derive(Debug, Error)]
pub enum OrmError {
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),

    #[error("unknown field `{field}` on `{model}`")]
    UnknownField { model: String, field: String },

    #[error("unknown relation `{relation}` on `{model}`")]
    UnknownRelation { model: String, relation: String },

    #[error("no `{model}` record found")]
    NotFound { model: String },

    #[error("unique constraint failed on `{model}` ({})", .fields.join(", "))]
    UniqueConstraintViolation { model: String, fields: Vec<String> },

    #[error("foreign key constraint failed on `{model}`")]
    ForeignKeyConstraintViolation { model: String },

    #[error("`{model}` unique lookup needs a unique field, got ({})", .fields.join(", "))]
    InvalidUniqueConstraint { model: String, fields: Vec<String> },

    #[error("groupBy on `{model}` needs at least one `by` field")]
    EmptyGroupByKey { model: String },

    #[error("groupBy on `{model}` orders by `{field}` which is not in `by`")]
    OrderByNotInGroupBy { model: String, field: String },

    #[error("groupBy on `{model}` filters `having` on `{field}` which is not in `by`")]
    HavingFieldNotInGroupBy { model: String, field: String },

    #[error("`{aggregate}` is not supported on `{model}.{field}`")]
    UnsupportedAggregateField {
        model: String,
        field: String,
        aggregate: &'static str,
    },

    #[error("missing required field `{model}.{field}`")]
    MissingRequiredField { model: String, field: String },

    #[error("invalid value for `{model}.{field}`: expected {expected}")]
    InvalidValue {
        model: String,
        field: String,
        expected: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("could not start a transaction within {max_wait_ms}ms")]
    TransactionStartTimeout { max_wait_ms: u64 },

    #[error("transaction exceeded its {timeout_ms}ms timeout and was rolled back")]
    TransactionTimeout { timeout_ms: u64 },

    #[error("transaction is already closed")]
    TransactionClosed,

    #[error("isolation level {0:?} is not supported by sqlite")]
    UnsupportedIsolationLevel(IsolationLevel),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("could not connect to the database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl OrmError {
    pub(crate) fn unknown_field(model: &str, field: &str) -> Self {
        Self::UnknownField {
            model: model.to_string(),
            field: field.to_string(),
        }
    }

    pub(crate) fn not_found(model: &str) -> Self {
        Self::NotFound {
            model: model.to_string(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Stable error code, modelled on the familiar `Pxxxx` ORM codes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "P2025",
            Self::UniqueConstraintViolation { .. } => "P2002",
            Self::ForeignKeyConstraintViolation { .. } => "P2003",
            Self::MissingRequiredField { .. } => "P2012",
            Self::InvalidValue { .. } => "P2007",
            Self::UnknownEntity(_)
            | Self::UnknownField { .. }
            | Self::UnknownRelation { .. }
            | Self::InvalidUniqueConstraint { .. }
            | Self::EmptyGroupByKey { .. }
            | Self::OrderByNotInGroupBy { .. }
            | Self::HavingFieldNotInGroupBy { .. }
            | Self::UnsupportedAggregateField { .. }
            | Self::InvalidArgument(_) => "P2009",
            Self::TransactionStartTimeout { .. }
            | Self::TransactionTimeout { .. }
            | Self::TransactionClosed
            | Self::UnsupportedIsolationLevel(_) => "P2028",
            Self::Serialization(_) => "P2023",
            Self::Connection(_) => "P1001",
            Self::Database(err) => match err {
                sqlx::Error::PoolTimedOut => "P2024",
                sqlx::Error::WorkerCrashed => "P1017",
                _ if is_busy(err) => "P2034",
                _ => "P2010",
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownEntity(_)
            | Self::UnknownField { .. }
            | Self::UnknownRelation { .. }
            | Self::InvalidUniqueConstraint { .. }
            | Self::EmptyGroupByKey { .. }
            | Self::OrderByNotInGroupBy { .. }
            | Self::HavingFieldNotInGroupBy { .. }
            | Self::UnsupportedAggregateField { .. }
            | Self::MissingRequiredField { .. }
            | Self::InvalidValue { .. }
            | Self::InvalidArgument(_)
            | Self::UnsupportedIsolationLevel(_) => ErrorCategory::Validation,
            Self::NotFound { .. }
            | Self::UniqueConstraintViolation { .. }
            | Self::ForeignKeyConstraintViolation { .. }
            | Self::Serialization(_) => ErrorCategory::Request,
            Self::TransactionStartTimeout { .. }
            | Self::TransactionTimeout { .. }
            | Self::TransactionClosed => ErrorCategory::Transaction,
            Self::Connection(_) => ErrorCategory::Initialization,
            Self::Database(err) => match err {
                sqlx::Error::Configuration(_)
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolClosed => ErrorCategory::Initialization,
                sqlx::Error::WorkerCrashed | sqlx::Error::Protocol(_) => ErrorCategory::Engine,
                _ if is_busy(err) => ErrorCategory::Transaction,
                _ => ErrorCategory::Request,
            },
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransactionStartTimeout { .. } | Self::TransactionTimeout { .. } => true,
            Self::Database(err) => matches!(err, sqlx::Error::PoolTimedOut) || is_busy(err),
            _ => false,
        }
    }

    /// Translate a sqlx error, resolving constraint failures to model fields.
    pub(crate) fn from_sqlx(err: sqlx::Error, registry: &SchemaRegistry, model: &str) -> Self {
        use sqlx::error::ErrorKind;

        let Some(db_err) = err.as_database_error() else {
            return Self::Database(err);
        };

        match db_err.kind() {
            ErrorKind::UniqueViolation => {
                let (table_model, fields) = constraint_columns(db_err.message(), registry);
                Self::UniqueConstraintViolation {
                    model: table_model.unwrap_or_else(|| model.to_string()),
                    fields,
                }
            }
            ErrorKind::ForeignKeyViolation => Self::ForeignKeyConstraintViolation {
                model: model.to_string(),
            },
            ErrorKind::NotNullViolation => {
                let (table_model, fields) = constraint_columns(db_err.message(), registry);
                Self::MissingRequiredField {
                    model: table_model.unwrap_or_else(|| model.to_string()),
                    field: fields.into_iter().next().unwrap_or_default(),
                }
            }
            _ => Self::Database(err),
        }
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn is_busy(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i64>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

/// Parse `UNIQUE constraint failed: user.email, user.name` into the owning
/// model name and its API field names.
fn constraint_columns(message: &str, registry: &SchemaRegistry) -> (Option<String>, Vec<String>) {
    let Some((_, columns)) = message.split_once("constraint failed: ") else {
        return (None, Vec::new());
    };

    let mut model_name = None;
    let mut fields = Vec::new();
    for qualified in columns.split(',').map(str::trim) {
        let Some((table, column)) = qualified.split_once('.') else {
            continue;
        };
        match registry.entity_by_table(table) {
            Some(model) => {
                model_name.get_or_insert_with(|| model.name.to_string());
                let field = model
                    .field_by_column(column)
                    .map(|f| f.name.to_string())
                    .unwrap_or_else(|| column.to_string());
                fields.push(field);
            }
            None => fields.push(column.to_string()),
        }
    }
    (model_name, fields)
}
