//! count, aggregate and groupBy

use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{OrmError, Result};
use crate::orm::args::{
    AggregateArgs, AggregateFunction, AggregateResult, AggregateSelection, CountArgs,
    GroupByArgs, GroupByRow, HavingInput, OrderBy,
};
use crate::orm::builder::{
    Fragment, QueryCompiler, ROOT, fetch_rows, order_clause, qcol, quote, resolve_order,
    table_ref,
};
use crate::orm::engine::Engine;
use crate::orm::value::{Value, decode_typed};
use crate::schema::{FieldType, ModelDef};

/// Alias of the windowed subquery aggregates read from.
const WINDOW: &str = "agg";

impl Engine {
    pub async fn count(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &CountArgs,
    ) -> Result<u64> {
        let Some(plan) = self.plan(conn, model, &args.window()).await? else {
            return Ok(0);
        };
        let sql = format!(
            "SELECT COUNT(*) FROM ({}) AS {}",
            plan.subquery_sql(),
            quote(WINDOW)
        );
        let rows = fetch_rows(conn, &sql, &plan.values)
            .await
            .map_err(|e| OrmError::from_sqlx(e, self.registry(), model.name))?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get(0)?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    pub async fn aggregate(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &AggregateArgs,
    ) -> Result<AggregateResult> {
        let columns = aggregate_columns(model, &args.select, WINDOW)?;
        let Some(plan) = self.plan(conn, model, &args.window()).await? else {
            return Ok(empty_result(&args.select));
        };
        if columns.is_empty() {
            return Ok(AggregateResult::default());
        }

        let sql = format!(
            "SELECT {} FROM ({}) AS {}",
            columns
                .iter()
                .map(|c| c.sql.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            plan.subquery_sql(),
            quote(WINDOW)
        );
        let rows = fetch_rows(conn, &sql, &plan.values)
            .await
            .map_err(|e| OrmError::from_sqlx(e, self.registry(), model.name))?;

        let mut result = AggregateResult::default();
        if let Some(row) = rows.first() {
            decode_aggregates(model, &columns, row, 0, &mut result)?;
        }
        Ok(result)
    }

    pub async fn group_by(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &GroupByArgs,
    ) -> Result<Vec<GroupByRow>> {
        if args.by.is_empty() {
            return Err(OrmError::EmptyGroupByKey {
                model: model.name.to_string(),
            });
        }
        let by = args
            .by
            .iter()
            .map(|f| model.field_or_err(f))
            .collect::<Result<Vec<_>>>()?;
        for order in &args.order_by {
            if !args.by.contains(&order.field) {
                return Err(OrmError::OrderByNotInGroupBy {
                    model: model.name.to_string(),
                    field: order.field.clone(),
                });
            }
        }
        let mut compiler = QueryCompiler::new(self.registry());
        let having = match &args.having {
            Some(having) => Some(compile_having(model, &args.by, having)?),
            None => None,
        };
        let columns = aggregate_columns(model, &args.select, ROOT)?;
        if let Some(take) = args.take.filter(|t| *t < 0) {
            return Err(OrmError::invalid(format!(
                "groupBy take must not be negative, got {take}"
            )));
        }
        if let Some(skip) = args.skip.filter(|s| *s < 0) {
            return Err(OrmError::invalid(format!(
                "skip must not be negative, got {skip}"
            )));
        }

        let filter = compiler.where_clause(model, ROOT, args.filter.as_ref())?;
        let default_order: Vec<OrderBy>;
        let order_by = if args.order_by.is_empty() {
            default_order = args.by.iter().map(OrderBy::asc).collect();
            &default_order
        } else {
            &args.order_by
        };
        let orders = resolve_order(self.registry(), model, order_by, false)?;

        let keys: Vec<String> = by.iter().map(|f| qcol(ROOT, f.column)).collect();
        let mut select = keys.clone();
        select.extend(columns.iter().map(|c| c.sql.clone()));

        let mut sql = format!(
            "SELECT {} FROM {} WHERE {} GROUP BY {}",
            select.join(", "),
            table_ref(model, ROOT),
            filter.sql,
            keys.join(", ")
        );
        let mut values = filter.values;
        if let Some(having) = having {
            sql.push_str(&format!(" HAVING {}", having.sql));
            values.extend(having.values);
        }
        sql.push_str(&format!(" ORDER BY {}", order_clause(ROOT, &orders)));
        match (args.take, args.skip.filter(|s| *s > 0)) {
            (Some(take), Some(skip)) => sql.push_str(&format!(" LIMIT {take} OFFSET {skip}")),
            (Some(take), None) => sql.push_str(&format!(" LIMIT {take}")),
            (None, Some(skip)) => sql.push_str(&format!(" LIMIT -1 OFFSET {skip}")),
            (None, None) => {}
        }

        let rows = fetch_rows(conn, &sql, &values)
            .await
            .map_err(|e| OrmError::from_sqlx(e, self.registry(), model.name))?;

        rows.iter()
            .map(|row| {
                let mut group = GroupByRow::default();
                for (i, field) in by.iter().enumerate() {
                    let value = decode_typed(model, field.name, field.field_type, row, i)?;
                    group.keys.insert(field.name.to_string(), value);
                }
                decode_aggregates(model, &columns, row, by.len(), &mut group.aggregates)?;
                Ok(group)
            })
            .collect()
    }
}

/// One selected aggregate expression.
#[derive(Debug)]
struct AggregateColumn {
    function: AggregateFunction,
    /// Field name, or `_all` for `COUNT(*)`
    field: String,
    field_type: FieldType,
    sql: String,
}

fn aggregate_columns(
    model: &ModelDef,
    select: &AggregateSelection,
    alias: &str,
) -> Result<Vec<AggregateColumn>> {
    let mut columns = Vec::new();
    if select.count_all {
        columns.push(AggregateColumn {
            function: AggregateFunction::Count,
            field: "_all".to_string(),
            field_type: FieldType::Int,
            sql: "COUNT(*)".to_string(),
        });
    }
    for (function, name) in select.entries() {
        let field = model.field_or_err(name)?;
        let numeric_only = matches!(function, AggregateFunction::Avg | AggregateFunction::Sum);
        if numeric_only && !field.field_type.is_numeric() {
            return Err(OrmError::UnsupportedAggregateField {
                model: model.name.to_string(),
                field: field.name.to_string(),
                aggregate: function.name(),
            });
        }
        columns.push(AggregateColumn {
            function,
            field: field.name.to_string(),
            field_type: field.field_type,
            sql: format!("{}({})", function.to_sql(), qcol(alias, field.column)),
        });
    }
    Ok(columns)
}

fn decode_aggregates(
    model: &ModelDef,
    columns: &[AggregateColumn],
    row: &SqliteRow,
    offset: usize,
    result: &mut AggregateResult,
) -> Result<()> {
    for (i, column) in columns.iter().enumerate() {
        let index = offset + i;
        let field = column.field.clone();
        match column.function {
            AggregateFunction::Count => {
                let count: Option<i64> = row.try_get(index)?;
                result.count.insert(field, count.unwrap_or(0));
            }
            AggregateFunction::Avg => {
                let avg: Option<f64> = row.try_get(index)?;
                result.avg.insert(field, avg.map(Value::Float).unwrap_or_default());
            }
            AggregateFunction::Min => {
                let value = decode_typed(model, &column.field, column.field_type, row, index)?;
                result.min.insert(field, value);
            }
            AggregateFunction::Max => {
                let value = decode_typed(model, &column.field, column.field_type, row, index)?;
                result.max.insert(field, value);
            }
            AggregateFunction::Sum => {
                let value = decode_typed(model, &column.field, column.field_type, row, index)?;
                result.sum.insert(field, value);
            }
        }
    }
    Ok(())
}

/// Aggregates over no rows: zero counts, null everything else.
fn empty_result(select: &AggregateSelection) -> AggregateResult {
    let mut result = AggregateResult::default();
    if select.count_all {
        result.count.insert("_all".to_string(), 0);
    }
    for (function, field) in select.entries() {
        let field = field.to_string();
        match function {
            AggregateFunction::Count => {
                result.count.insert(field, 0);
            }
            AggregateFunction::Min => {
                result.min.insert(field, Value::Null);
            }
            AggregateFunction::Max => {
                result.max.insert(field, Value::Null);
            }
            AggregateFunction::Avg => {
                result.avg.insert(field, Value::Null);
            }
            AggregateFunction::Sum => {
                result.sum.insert(field, Value::Null);
            }
        }
    }
    result
}

fn compile_having(model: &ModelDef, by: &[String], having: &HavingInput) -> Result<Fragment> {
    let all = |items: &[HavingInput]| -> Result<Vec<Fragment>> {
        items
            .iter()
            .map(|item| compile_having(model, by, item))
            .collect()
    };
    match having {
        HavingInput::And(items) => Ok(Fragment::and(all(items)?)),
        HavingInput::Or(items) => Ok(Fragment::or(all(items)?)),
        HavingInput::Not(items) => Ok(Fragment::and(
            all(items)?.into_iter().map(Fragment::negate).collect(),
        )),
        HavingInput::Field {
            field,
            aggregate,
            filter,
        } => {
            let def = model.field_or_err(field)?;
            if !by.contains(field) {
                return Err(OrmError::HavingFieldNotInGroupBy {
                    model: model.name.to_string(),
                    field: field.clone(),
                });
            }
            let column = qcol(ROOT, def.column);
            let (expr, expected) = match aggregate {
                None => (column, def.field_type),
                Some(function) => {
                    let numeric_only =
                        matches!(function, AggregateFunction::Avg | AggregateFunction::Sum);
                    if numeric_only && !def.field_type.is_numeric() {
                        return Err(OrmError::UnsupportedAggregateField {
                            model: model.name.to_string(),
                            field: def.name.to_string(),
                            aggregate: function.name(),
                        });
                    }
                    let expected = match function {
                        AggregateFunction::Count => FieldType::Int,
                        AggregateFunction::Avg => FieldType::Float,
                        _ => def.field_type,
                    };
                    (format!("{}({})", function.to_sql(), column), expected)
                }
            };
            if filter.field_type() != expected {
                return Err(OrmError::InvalidValue {
                    model: model.name.to_string(),
                    field: def.name.to_string(),
                    expected: expected.to_string(),
                });
            }
            Ok(Fragment::from_conditions(filter.to_sql_conditions(&expr)))
        }
    }
}
