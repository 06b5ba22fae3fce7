//! Raw SQL passthrough
//!
//! `Sql` keeps literal text and bound values apart: text only enters through
//! `new`/`push`, values only through `bind`, which always emits a `?`
//! placeholder. The `*_unsafe` entry points take a caller-built string and are
//! open to injection if that string contains untrusted input.

use sqlx::SqliteConnection;

use crate::error::Result;
use crate::orm::builder::{execute_with_binds, fetch_rows};
use crate::orm::value::{Record, SqlValue, Value, decode_dynamic_row};

/// A parameterized SQL statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    text: String,
    values: Vec<SqlValue>,
}

impl Sql {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            values: Vec::new(),
        }
    }

    /// Append literal SQL.
    pub fn push(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self
    }

    /// Append a `?` placeholder bound to `value`.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.text.push('?');
        self.values.push(value.into().to_sql());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// Build an `Sql` from literal text and interleaved binds:
/// `sql!("SELECT * FROM \"user\" WHERE \"email\" = ", email)`.
#[macro_export]
macro_rules! sql {
    ($text:expr $(, $value:expr, $rest:expr)* $(,)?) => {
        $crate::orm::raw::Sql::new($text)$(.bind($value).push($rest))*
    };
}

pub(crate) async fn execute_raw(conn: &mut SqliteConnection, sql: &Sql) -> Result<u64> {
    let result = execute_with_binds(conn, &sql.text, &sql.values).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn query_raw(conn: &mut SqliteConnection, sql: &Sql) -> Result<Vec<Record>> {
    let rows = fetch_rows(conn, &sql.text, &sql.values).await?;
    rows.iter().map(decode_dynamic_row).collect()
}

pub(crate) async fn execute_raw_unsafe(
    conn: &mut SqliteConnection,
    text: &str,
    params: Vec<Value>,
) -> Result<u64> {
    let values: Vec<SqlValue> = params.iter().map(Value::to_sql).collect();
    let result = execute_with_binds(conn, text, &values).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn query_raw_unsafe(
    conn: &mut SqliteConnection,
    text: &str,
    params: Vec<Value>,
) -> Result<Vec<Record>> {
    let values: Vec<SqlValue> = params.iter().map(Value::to_sql).collect();
    let rows = fetch_rows(conn, text, &values).await?;
    rows.iter().map(decode_dynamic_row).collect()
}
