//! Schema synchronization from the registry
//!
//! - Creates missing tables (with foreign keys) and indexes
//! - Adds missing columns to existing tables
//! - Does NOT handle column renames or type changes (requires DB wipe)

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::schema::{FieldDef, ModelDef, SchemaRegistry};

/// Result of a schema sync operation
#[derive(Debug, Default)]
pub struct SchemaSyncResult {
    pub tables_created: Vec<String>,
    pub columns_added: Vec<(String, String)>, // (table, column)
    pub indexes_created: usize,
    pub errors: Vec<String>,
}

impl SchemaSyncResult {
    fn merge(&mut self, other: SchemaSyncResult) {
        self.tables_created.extend(other.tables_created);
        self.columns_added.extend(other.columns_added);
        self.indexes_created += other.indexes_created;
        self.errors.extend(other.errors);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Column names of `table`; empty when the table does not exist.
async fn existing_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(pool)
        .await
}

/// Sync a single model's table to the database
pub async fn sync_model(
    pool: &SqlitePool,
    registry: &SchemaRegistry,
    model: &ModelDef,
) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();
    let table_name = model.table;

    let columns = existing_columns(pool, table_name).await?;
    if columns.is_empty() {
        let create_sql = model.create_table_sql(registry);
        debug!("Creating table {}: {}", table_name, create_sql);

        match sqlx::query(&create_sql).execute(pool).await {
            Ok(_) => {
                info!("Created table: {}", table_name);
                result.tables_created.push(table_name.to_string());
            }
            Err(e) => {
                let msg = format!("Failed to create table {}: {}", table_name, e);
                warn!("{}", msg);
                result.errors.push(msg);
                return Ok(result);
            }
        }
    } else {
        for field in &model.fields {
            if columns.iter().any(|c| c == field.column) {
                continue;
            }
            let alter_sql = generate_add_column_sql(table_name, field);
            debug!("Adding column to {}: {}", table_name, alter_sql);

            match sqlx::query(&alter_sql).execute(pool).await {
                Ok(_) => {
                    info!("Added column {}.{}", table_name, field.column);
                    result
                        .columns_added
                        .push((table_name.to_string(), field.column.to_string()));
                }
                Err(e) => {
                    let msg = format!(
                        "Failed to add column {}.{}: {}",
                        table_name, field.column, e
                    );
                    warn!("{}", msg);
                    result.errors.push(msg);
                }
            }
        }
    }

    for index_sql in model.index_sql() {
        match sqlx::query(&index_sql).execute(pool).await {
            Ok(_) => result.indexes_created += 1,
            Err(e) => {
                let msg = format!("Failed to create index on {}: {}", table_name, e);
                warn!("{}", msg);
                result.errors.push(msg);
            }
        }
    }

    Ok(result)
}

/// Generate ALTER TABLE ADD COLUMN SQL
fn generate_add_column_sql(table_name: &str, field: &FieldDef) -> String {
    // SQLite cannot add PRIMARY KEY or UNIQUE columns, and NOT NULL columns
    // need a default; uniqueness comes from the index created afterwards.
    let mut sql = format!(
        "ALTER TABLE \"{}\" ADD COLUMN \"{}\" {}",
        table_name,
        field.column,
        field.field_type.sql_type()
    );

    let has_literal_default = field.default.is_some_and(|d| {
        !matches!(
            d,
            crate::schema::DefaultValue::Uuid | crate::schema::DefaultValue::Now
        )
    });
    if has_literal_default {
        let column = field.column_sql();
        if let Some(idx) = column.find(" DEFAULT ") {
            if !field.nullable {
                sql.push_str(" NOT NULL");
            }
            sql.push_str(&column[idx..]);
        }
    } else if !field.nullable {
        let default_val = match field.field_type.sql_type() {
            "INTEGER" => "0",
            "REAL" => "0.0",
            _ => "''",
        };
        sql.push_str(&format!(" NOT NULL DEFAULT {}", default_val));
    }

    sql
}

/// Sync every registered model, parents first.
///
/// Called by `Client::push_schema` and the `--push` command to make sure all
/// tables exist and have the expected columns.
pub async fn push_schema(pool: &SqlitePool, registry: &SchemaRegistry) -> SchemaSyncResult {
    let mut total_result = SchemaSyncResult::default();

    for model in registry.models() {
        match sync_model(pool, registry, model).await {
            Ok(result) => total_result.merge(result),
            Err(e) => {
                total_result
                    .errors
                    .push(format!("Error syncing {}: {}", model.name, e));
            }
        }
    }

    info!(
        tables_created = total_result.tables_created.len(),
        columns_added = total_result.columns_added.len(),
        errors = total_result.errors.len(),
        "Schema push complete"
    );
    total_result
}
