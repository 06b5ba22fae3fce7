//! Relation loading
//!
//! Includes are resolved with one batched `IN (..)` query per relation and
//! nesting level, never one query per parent row.

use std::collections::{BTreeMap, HashMap, HashSet};

use futures::future::BoxFuture;
use sqlx::SqliteConnection;

use crate::error::{OrmError, Result};
use crate::orm::args::{IncludeArgs, Projection};
use crate::orm::builder::{
    Fragment, QueryCompiler, ROOT, apply_projection, fetch_rows, order_clause, qcol,
    resolve_order, select_columns, table_ref, validate_projection,
};
use crate::orm::value::{Record, Related, Value, decode_model_row};
use crate::schema::{ModelDef, RelationDef, SchemaRegistry};

/// Keys bound per batched query, below SQLite's parameter limit.
const KEY_CHUNK: usize = 900;

/// Attach every requested relation to `records`, recursing into nested
/// includes.
pub(crate) fn resolve_includes<'a>(
    conn: &'a mut SqliteConnection,
    registry: &'a SchemaRegistry,
    model: &'a ModelDef,
    records: &'a mut [Record],
    includes: &'a BTreeMap<String, IncludeArgs>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        for (name, args) in includes {
            let relation = model.relation_or_err(name)?;
            let target = registry.get_entity(relation.target)?;

            let mut seen = HashSet::new();
            let keys: Vec<Value> = records
                .iter()
                .filter_map(|r| r.get(relation.local_field))
                .filter(|v| v.group_key().is_some_and(|k| seen.insert(k)))
                .cloned()
                .collect();

            let mut children = if keys.is_empty() {
                Vec::new()
            } else {
                load_children(conn, registry, relation, target, &keys, args).await?
            };
            if !args.projection.include.is_empty() && !children.is_empty() {
                resolve_includes(
                    conn,
                    registry,
                    target,
                    &mut children,
                    &args.projection.include,
                )
                .await?;
            }

            let mut groups: HashMap<String, Vec<Record>> = HashMap::new();
            for child in children {
                if let Some(key) = child.get(relation.target_field).and_then(Value::group_key) {
                    groups.entry(key).or_default().push(child);
                }
            }

            for record in records.iter_mut() {
                let rows = record
                    .get(relation.local_field)
                    .and_then(Value::group_key)
                    .and_then(|k| groups.get(&k))
                    .cloned()
                    .unwrap_or_default();
                let mut rows = window(rows, args.skip, args.take);
                for row in &mut rows {
                    apply_projection(row, &args.projection);
                }
                let related = if relation.is_list() {
                    Related::Many(rows)
                } else {
                    Related::One(rows.into_iter().next().map(Box::new))
                };
                record.set_relation(name.clone(), related);
            }
        }
        Ok(())
    })
}

/// Related rows for every key, filtered and ordered per `args`.
async fn load_children(
    conn: &mut SqliteConnection,
    registry: &SchemaRegistry,
    relation: &RelationDef,
    target: &ModelDef,
    keys: &[Value],
    args: &IncludeArgs,
) -> Result<Vec<Record>> {
    let join = target.field_or_err(relation.target_field)?;
    let orders = resolve_order(registry, target, &args.order_by, true)?;
    let filter = QueryCompiler::new(registry).where_clause(target, ROOT, args.filter.as_ref())?;

    let mut children = Vec::new();
    for chunk in keys.chunks(KEY_CHUNK) {
        let membership = Fragment::new(
            format!(
                "{} IN ({})",
                qcol(ROOT, join.column),
                vec!["?"; chunk.len()].join(", ")
            ),
            chunk.iter().map(Value::to_sql).collect(),
        );
        let condition = Fragment::and(vec![membership, filter.clone()]);
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            select_columns(target, ROOT),
            table_ref(target, ROOT),
            condition.sql,
            order_clause(ROOT, &orders)
        );
        let rows = fetch_rows(conn, &sql, &condition.values)
            .await
            .map_err(|e| OrmError::from_sqlx(e, registry, target.name))?;
        for row in &rows {
            children.push(decode_model_row(target, row, 0)?);
        }
    }
    Ok(children)
}

/// Per-parent skip/take; a negative take keeps the last rows.
fn window(mut rows: Vec<Record>, skip: Option<i64>, take: Option<i64>) -> Vec<Record> {
    let backwards = take.is_some_and(|t| t < 0);
    if backwards {
        rows.reverse();
    }
    let skip = skip.unwrap_or(0).max(0) as usize;
    let mut rows: Vec<Record> = rows.into_iter().skip(skip).collect();
    if let Some(take) = take {
        rows.truncate(take.unsigned_abs() as usize);
    }
    if backwards {
        rows.reverse();
    }
    rows
}

/// Load one relation of an already fetched record.
pub(crate) async fn load_relation(
    conn: &mut SqliteConnection,
    registry: &SchemaRegistry,
    model: &ModelDef,
    record: &Record,
    relation: &str,
    args: IncludeArgs,
) -> Result<Related> {
    let mut include = BTreeMap::new();
    include.insert(relation.to_string(), args);
    let projection = Projection {
        include,
        ..Default::default()
    };
    validate_projection(registry, model, &projection)?;

    let mut records = vec![record.clone()];
    resolve_includes(conn, registry, model, &mut records, &projection.include).await?;
    records
        .pop()
        .and_then(|r| r.relation(relation).cloned())
        .ok_or_else(|| OrmError::UnknownRelation {
            model: model.name.to_string(),
            relation: relation.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut r = Record::new();
                r.set("n", i as i64);
                r
            })
            .collect()
    }

    fn ns(records: &[Record]) -> Vec<i64> {
        records
            .iter()
            .filter_map(|r| r.get("n").and_then(Value::as_i64))
            .collect()
    }

    #[test]
    fn test_window_forward() {
        assert_eq!(ns(&window(rows(5), Some(1), Some(2))), vec![1, 2]);
        assert_eq!(ns(&window(rows(5), None, None)), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_window_backwards_keeps_last_rows() {
        assert_eq!(ns(&window(rows(5), None, Some(-2))), vec![3, 4]);
        assert_eq!(ns(&window(rows(5), Some(1), Some(-2))), vec![2, 3]);
    }
}
