//! SQL query builder
//!
//! Compiles where-expressions, ordering, cursors and windows into
//! parameterized SQLite SQL. Every table reference is aliased (`t0` for the
//! root, `t1`.. for relation subqueries) and every value is bound through a
//! `?` placeholder in order of appearance, so fragments compose by plain
//! string concatenation.

use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteQueryResult, SqliteRow};

use crate::error::{OrmError, Result};
use crate::orm::args::{FindManyArgs, NullsOrder, OrderBy, Projection, SortOrder};
use crate::orm::filters::{RelationFilter, ScalarFilter, WhereInput, WhereUniqueInput};
use crate::orm::value::{Record, SqlValue, Value};
use crate::schema::shapes::RelationFilterOperator;
use crate::schema::{FieldDef, ModelDef, SchemaRegistry};

/// Alias of the root table in every generated statement.
pub(crate) const ROOT: &str = "t0";

// ============================================================================
// Fragments
// ============================================================================

/// A piece of SQL with the values its placeholders bind, in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fragment {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    pub fn truthy() -> Self {
        Self::raw("1=1")
    }

    pub fn falsy() -> Self {
        Self::raw("1=0")
    }

    fn join(parts: Vec<Fragment>, separator: &str, empty: Fragment) -> Fragment {
        if parts.is_empty() {
            return empty;
        }
        if parts.len() == 1 {
            return parts.into_iter().next().unwrap_or(empty);
        }
        let mut sql = Vec::with_capacity(parts.len());
        let mut values = Vec::new();
        for part in parts {
            sql.push(format!("({})", part.sql));
            values.extend(part.values);
        }
        Fragment::new(sql.join(separator), values)
    }

    /// Conjunction; empty is true
    pub fn and(parts: Vec<Fragment>) -> Fragment {
        Self::join(parts, " AND ", Fragment::truthy())
    }

    /// Disjunction; empty is false
    pub fn or(parts: Vec<Fragment>) -> Fragment {
        Self::join(parts, " OR ", Fragment::falsy())
    }

    pub fn negate(self) -> Fragment {
        Fragment::new(format!("NOT ({})", self.sql), self.values)
    }

    pub(crate) fn from_conditions((sql, values): (Vec<String>, Vec<SqlValue>)) -> Fragment {
        if sql.is_empty() {
            return Fragment::truthy();
        }
        Fragment::new(sql.join(" AND "), values)
    }
}

/// Quote an identifier
pub(crate) fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Qualified column reference: `"t0"."email"`
pub(crate) fn qcol(alias: &str, column: &str) -> String {
    format!("{}.{}", quote(alias), quote(column))
}

/// Every column of the model, in field order
pub(crate) fn select_columns(model: &ModelDef, alias: &str) -> String {
    model
        .fields
        .iter()
        .map(|f| qcol(alias, f.column))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `"table" AS "alias"`
pub(crate) fn table_ref(model: &ModelDef, alias: &str) -> String {
    format!("{} AS {}", quote(model.table), quote(alias))
}

// ============================================================================
// Ordering
// ============================================================================

/// An ORDER BY entry resolved against the schema.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOrder<'m> {
    pub field: &'m FieldDef,
    pub order: SortOrder,
    pub nulls_first: bool,
}

impl ResolvedOrder<'_> {
    pub fn reversed(&self) -> Self {
        Self {
            field: self.field,
            order: self.order.reverse(),
            nulls_first: !self.nulls_first,
        }
    }

    fn to_sql(&self, alias: &str) -> String {
        let mut sql = format!("{} {}", qcol(alias, self.field.column), self.order.to_sql());
        if self.field.nullable {
            sql.push_str(if self.nulls_first {
                " NULLS FIRST"
            } else {
                " NULLS LAST"
            });
        }
        sql
    }
}

pub(crate) fn order_clause(alias: &str, orders: &[ResolvedOrder<'_>]) -> String {
    orders
        .iter()
        .map(|o| o.to_sql(alias))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve and validate `order_by`; the primary key is appended as a
/// tiebreaker when `tiebreak` is set and it is not already ordered on.
pub(crate) fn resolve_order<'m>(
    registry: &SchemaRegistry,
    model: &'m ModelDef,
    order_by: &[OrderBy],
    tiebreak: bool,
) -> Result<Vec<ResolvedOrder<'m>>> {
    let shapes = registry.shapes(model.name)?;
    let mut resolved = Vec::with_capacity(order_by.len() + 1);

    for entry in order_by {
        let field = model.field_or_err(&entry.field)?;
        let shape = shapes
            .order(field.name)
            .ok_or_else(|| OrmError::unknown_field(model.name, &entry.field))?;
        if entry.nulls.is_some() && !shape.nulls_ordering {
            return Err(OrmError::invalid(format!(
                "nulls ordering requires a nullable field, `{}.{}` is required",
                model.name, field.name
            )));
        }
        // SQLite sorts NULL as the smallest value
        let nulls_first = match entry.nulls {
            Some(NullsOrder::First) => true,
            Some(NullsOrder::Last) => false,
            None => entry.order == SortOrder::Asc,
        };
        resolved.push(ResolvedOrder {
            field,
            order: entry.order,
            nulls_first,
        });
    }

    let id = model.id_field();
    if tiebreak && !resolved.iter().any(|o| o.field.name == id.name) {
        resolved.push(ResolvedOrder {
            field: id,
            order: SortOrder::Asc,
            nulls_first: true,
        });
    }
    Ok(resolved)
}

/// Rows at or after `cursor` in the given ordering.
///
/// Expands to `(a > ?) OR (a IS ? AND b > ?) OR .. OR (a IS ? AND .. AND id IS ?)`
/// with NULL placement honoured per column.
pub(crate) fn cursor_condition(
    alias: &str,
    orders: &[ResolvedOrder<'_>],
    cursor: &Record,
) -> Fragment {
    let mut branches = Vec::with_capacity(orders.len() + 1);
    let mut prefix: Vec<Fragment> = Vec::new();

    for entry in orders {
        let col = qcol(alias, entry.field.column);
        let value = cursor.get(entry.field.name).cloned().unwrap_or(Value::Null);

        let after = if value.is_null() {
            if entry.nulls_first {
                Fragment::raw(format!("{col} IS NOT NULL"))
            } else {
                Fragment::falsy()
            }
        } else {
            let op = match entry.order {
                SortOrder::Asc => ">",
                SortOrder::Desc => "<",
            };
            let strict = format!("{col} {op} ?");
            if entry.nulls_first || !entry.field.nullable {
                Fragment::new(strict, vec![value.to_sql()])
            } else {
                Fragment::new(format!("{strict} OR {col} IS NULL"), vec![value.to_sql()])
            }
        };

        let mut branch = prefix.clone();
        branch.push(after);
        branches.push(Fragment::and(branch));

        prefix.push(Fragment::new(format!("{col} IS ?"), vec![value.to_sql()]));
    }
    branches.push(Fragment::and(prefix));
    Fragment::or(branches)
}

// ============================================================================
// Where compilation
// ============================================================================

/// Compiles filters for one statement, handing out table aliases.
pub(crate) struct QueryCompiler<'r> {
    registry: &'r SchemaRegistry,
    next_alias: usize,
}

impl<'r> QueryCompiler<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            next_alias: 1,
        }
    }

    fn alias(&mut self) -> String {
        let alias = format!("t{}", self.next_alias);
        self.next_alias += 1;
        alias
    }

    /// Optional filter; absent means every row
    pub fn where_clause(
        &mut self,
        model: &ModelDef,
        alias: &str,
        filter: Option<&WhereInput>,
    ) -> Result<Fragment> {
        match filter {
            Some(filter) => self.compile_where(model, alias, filter),
            None => Ok(Fragment::truthy()),
        }
    }

    pub fn compile_where(
        &mut self,
        model: &ModelDef,
        alias: &str,
        filter: &WhereInput,
    ) -> Result<Fragment> {
        match filter {
            WhereInput::And(items) => {
                let parts = self.compile_all(model, alias, items)?;
                Ok(Fragment::and(parts))
            }
            WhereInput::Or(items) => {
                let parts = self.compile_all(model, alias, items)?;
                Ok(Fragment::or(parts))
            }
            WhereInput::Not(items) => {
                let parts = self.compile_all(model, alias, items)?;
                Ok(Fragment::and(parts.into_iter().map(Fragment::negate).collect()))
            }
            WhereInput::Field { field, filter } => self.compile_field(model, alias, field, filter),
            WhereInput::Equals { field, value } => self.compile_equals(model, alias, field, value),
            WhereInput::Relation { relation, filter } => {
                self.compile_relation(model, alias, relation, filter)
            }
        }
    }

    fn compile_all(
        &mut self,
        model: &ModelDef,
        alias: &str,
        items: &[WhereInput],
    ) -> Result<Vec<Fragment>> {
        items
            .iter()
            .map(|item| self.compile_where(model, alias, item))
            .collect()
    }

    fn compile_field(
        &self,
        model: &ModelDef,
        alias: &str,
        name: &str,
        filter: &ScalarFilter,
    ) -> Result<Fragment> {
        let field = model.field_or_err(name)?;
        let shape = self
            .registry
            .shapes(model.name)?
            .filter(field.name)
            .ok_or_else(|| OrmError::unknown_field(model.name, name))?;

        if filter.field_type() != shape.field_type {
            return Err(OrmError::invalid(format!(
                "`{}.{}` is {}, got a {} filter",
                model.name,
                name,
                shape.field_type,
                filter.field_type()
            )));
        }
        if let Some(op) = filter.operators().into_iter().find(|op| !shape.supports(*op)) {
            return Err(OrmError::invalid(format!(
                "`{}` is not supported on `{}.{}`",
                op.name(),
                model.name,
                name
            )));
        }

        let expr = qcol(alias, field.column);
        Ok(Fragment::from_conditions(filter.to_sql_conditions(&expr)))
    }

    fn compile_equals(
        &self,
        model: &ModelDef,
        alias: &str,
        name: &str,
        value: &Value,
    ) -> Result<Fragment> {
        let field = model.field_or_err(name)?;
        let expr = qcol(alias, field.column);
        if value.is_null() {
            return Ok(Fragment::raw(format!("{expr} IS NULL")));
        }
        let value = value.clone().coerce(model, field)?;
        Ok(Fragment::new(format!("{expr} = ?"), vec![value.to_sql()]))
    }

    fn compile_relation(
        &mut self,
        model: &ModelDef,
        alias: &str,
        name: &str,
        filter: &RelationFilter,
    ) -> Result<Fragment> {
        let relation = model.relation_or_err(name)?;
        let target = self.registry.get_entity(relation.target)?;
        let shape = self
            .registry
            .shapes(model.name)?
            .relation_filter(name)
            .ok_or_else(|| OrmError::UnknownRelation {
                model: model.name.to_string(),
                relation: name.to_string(),
            })?;

        let op = match filter {
            RelationFilter::Some(_) => RelationFilterOperator::Some,
            RelationFilter::Every(_) => RelationFilterOperator::Every,
            RelationFilter::None(_) => RelationFilterOperator::None,
            RelationFilter::Is(_) => RelationFilterOperator::Is,
            RelationFilter::IsNot(_) => RelationFilterOperator::IsNot,
        };
        if !shape.operators.contains(&op) {
            return Err(OrmError::invalid(format!(
                "`{op:?}` is not a valid filter for relation `{}.{}`",
                model.name, name
            )));
        }

        let local = model.field_or_err(relation.local_field)?;
        let remote = target.field_or_err(relation.target_field)?;
        let sub = self.alias();
        let link = format!(
            "{} = {}",
            qcol(&sub, remote.column),
            qcol(alias, local.column)
        );

        let subquery = |this: &mut Self,
                        inner: Option<&WhereInput>,
                        negate_inner: bool|
         -> Result<Fragment> {
            let mut fragment = match inner {
                Some(inner) => this.compile_where(target, &sub, inner)?,
                None => Fragment::truthy(),
            };
            if negate_inner {
                fragment = fragment.negate();
            }
            Ok(Fragment::new(
                format!(
                    "EXISTS (SELECT 1 FROM {} WHERE {} AND ({}))",
                    table_ref(target, &sub),
                    link,
                    fragment.sql
                ),
                fragment.values,
            ))
        };

        let local_col = qcol(alias, local.column);
        Ok(match filter {
            RelationFilter::Some(inner) => subquery(self, Some(inner.as_ref()), false)?,
            RelationFilter::Every(inner) => subquery(self, Some(inner.as_ref()), true)?.negate(),
            RelationFilter::None(inner) => subquery(self, Some(inner.as_ref()), false)?.negate(),
            RelationFilter::Is(None) if relation.is_owning() => {
                Fragment::raw(format!("{local_col} IS NULL"))
            }
            RelationFilter::Is(None) => subquery(self, None, false)?.negate(),
            RelationFilter::Is(Some(inner)) => subquery(self, Some(inner.as_ref()), false)?,
            RelationFilter::IsNot(None) if relation.is_owning() => {
                Fragment::raw(format!("{local_col} IS NOT NULL"))
            }
            RelationFilter::IsNot(None) => subquery(self, None, false)?,
            RelationFilter::IsNot(Some(inner)) => subquery(self, Some(inner.as_ref()), false)?.negate(),
        })
    }

    /// Compile a unique selector, rejecting selectors without a unique field.
    pub fn compile_unique(
        &mut self,
        model: &ModelDef,
        alias: &str,
        unique: &WhereUniqueInput,
    ) -> Result<Fragment> {
        for field in unique.key_fields() {
            model.field_or_err(field)?;
        }
        let shapes = self.registry.shapes(model.name)?;
        if !shapes.is_unique_selector(&unique.key_fields()) {
            return Err(OrmError::InvalidUniqueConstraint {
                model: model.name.to_string(),
                fields: unique.key_fields().iter().map(|f| f.to_string()).collect(),
            });
        }

        let mut parts = Vec::with_capacity(unique.keys.len() + 1);
        for (field, value) in &unique.keys {
            parts.push(self.compile_equals(model, alias, field, value)?);
        }
        if let Some(filter) = &unique.filter {
            parts.push(self.compile_where(model, alias, filter)?);
        }
        Ok(Fragment::and(parts))
    }

    /// Plan a windowed SELECT over the root table.
    ///
    /// `cursor_row` is the row the cursor resolved to; the caller returns an
    /// empty result instead of planning when the cursor matched nothing.
    pub fn plan<'m>(
        &mut self,
        model: &'m ModelDef,
        args: &FindManyArgs,
        cursor_row: Option<&Record>,
    ) -> Result<SelectPlan<'m>> {
        if let Some(skip) = args.skip.filter(|s| *s < 0) {
            return Err(OrmError::invalid(format!("skip must not be negative, got {skip}")));
        }
        for field in &args.distinct {
            model.field_or_err(field)?;
        }

        let mut conditions = vec![self.where_clause(model, ROOT, args.filter.as_ref())?];
        let requested = resolve_order(self.registry, model, &args.order_by, true)?;
        let backwards = args.take.is_some_and(|t| t < 0);
        let reversed: Vec<_> = if backwards {
            requested.iter().map(ResolvedOrder::reversed).collect()
        } else {
            requested.clone()
        };

        // the set of rows up to the cursor is the same whichever way they are sorted
        if let Some(row) = cursor_row {
            conditions.push(cursor_condition(ROOT, &reversed, row));
        }

        let fragment = Fragment::and(conditions);
        let take = args.take.map(take_magnitude);
        // distinct keeps the first row in the requested order, so those rows
        // are fetched unreversed and windowed in memory from the far end
        let in_memory = !args.distinct.is_empty();
        let (order, limit, offset, window) = if in_memory {
            (requested, None, None, Some((args.skip, take)))
        } else {
            (reversed, take, args.skip, None)
        };

        Ok(SelectPlan {
            model,
            from_where: format!("FROM {} WHERE {}", table_ref(model, ROOT), fragment.sql),
            values: fragment.values,
            order,
            backwards: backwards && !in_memory,
            window_from_end: backwards && in_memory,
            limit,
            offset,
            distinct: args.distinct.clone(),
            window,
        })
    }
}

// ============================================================================
// Select plans
// ============================================================================

/// A compiled, windowed SELECT over one model.
#[derive(Debug)]
pub(crate) struct SelectPlan<'m> {
    pub model: &'m ModelDef,
    /// `FROM .. WHERE ..`
    pub from_where: String,
    pub values: Vec<SqlValue>,
    /// Effective order (already reversed for backwards takes)
    pub order: Vec<ResolvedOrder<'m>>,
    /// Rows come back reversed and must be flipped after fetching
    pub backwards: bool,
    /// The in-memory window counts skip and take from the last row
    pub window_from_end: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub distinct: Vec<String>,
    /// (skip, take) applied after in-memory distinct
    pub window: Option<(Option<i64>, Option<i64>)>,
}

impl SelectPlan<'_> {
    fn tail(&self) -> String {
        let mut sql = format!(" ORDER BY {}", order_clause(ROOT, &self.order));
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"))
            }
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {offset}"))
            }
            _ => {}
        }
        sql
    }

    /// Full rows
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT {} {}{}",
            select_columns(self.model, ROOT),
            self.from_where,
            self.tail()
        )
    }

    /// Primary keys only, for mutations that act on the matched rows
    pub fn id_sql(&self) -> String {
        format!(
            "SELECT {} {}{}",
            qcol(ROOT, self.model.id_field().column),
            self.from_where,
            self.tail()
        )
    }

    /// The windowed rows as a subquery source (`SELECT "t0".* ..`)
    pub fn subquery_sql(&self) -> String {
        format!("SELECT {}.* {}{}", quote(ROOT), self.from_where, self.tail())
    }

    /// Apply the in-memory part of the plan to fetched rows.
    pub fn finish(&self, mut records: Vec<Record>) -> Vec<Record> {
        if !self.distinct.is_empty() {
            let mut seen = std::collections::HashSet::new();
            records.retain(|record| {
                let key: Vec<Option<String>> = self
                    .distinct
                    .iter()
                    .map(|f| record.get(f).and_then(Value::group_key))
                    .collect();
                seen.insert(key)
            });
        }
        if let Some((skip, take)) = self.window {
            if self.window_from_end {
                records.reverse();
            }
            let skip = usize::try_from(skip.unwrap_or(0)).unwrap_or(0);
            records = records.into_iter().skip(skip).collect();
            if let Some(take) = take {
                records.truncate(usize::try_from(take).unwrap_or(usize::MAX));
            }
            if self.window_from_end {
                records.reverse();
            }
        }
        if self.backwards {
            records.reverse();
        }
        records
    }
}

/// Row count of a take; `i64::MIN` has no positive counterpart and saturates.
fn take_magnitude(take: i64) -> i64 {
    take.checked_abs().unwrap_or(i64::MAX)
}

// ============================================================================
// Projection
// ============================================================================

/// Check select/omit/include against the schema before anything runs.
pub(crate) fn validate_projection(
    registry: &SchemaRegistry,
    model: &ModelDef,
    projection: &Projection,
) -> Result<()> {
    if projection.select.is_some() && !projection.omit.is_empty() {
        return Err(OrmError::invalid("select and omit cannot be combined"));
    }
    for field in projection.select.iter().flatten().chain(&projection.omit) {
        model.field_or_err(field)?;
    }
    for (name, args) in &projection.include {
        let relation = model.relation_or_err(name)?;
        let target = registry.get_entity(relation.target)?;
        if !relation.is_list()
            && (args.filter.is_some()
                || !args.order_by.is_empty()
                || args.skip.is_some()
                || args.take.is_some())
        {
            return Err(OrmError::invalid(format!(
                "`{}.{}` is a to-one relation and takes no where/orderBy/skip/take",
                model.name, name
            )));
        }
        if let Some(filter) = &args.filter {
            QueryCompiler::new(registry).compile_where(target, ROOT, filter)?;
        }
        resolve_order(registry, target, &args.order_by, false)?;
        if args.skip.is_some_and(|s| s < 0) {
            return Err(OrmError::invalid("skip must not be negative"));
        }
        validate_projection(registry, target, &args.projection)?;
    }
    Ok(())
}

/// Drop scalar fields the projection does not ask for.
pub(crate) fn apply_projection(record: &mut Record, projection: &Projection) {
    if let Some(select) = &projection.select {
        record.retain_fields(|f| select.iter().any(|s| s == f));
    } else if !projection.omit.is_empty() {
        record.retain_fields(|f| !projection.omit.iter().any(|s| s == f));
    }
}

// ============================================================================
// Execution
// ============================================================================

fn bind_all<'q>(
    sql: &'q str,
    values: &'q [SqlValue],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    let mut query = sqlx::query(sql);
    for value in values {
        query = value.bind_to_query(query);
    }
    query
}

/// Run a statement that returns rows.
pub(crate) async fn fetch_rows(
    conn: &mut SqliteConnection,
    sql: &str,
    values: &[SqlValue],
) -> std::result::Result<Vec<SqliteRow>, sqlx::Error> {
    tracing::debug!(sql = %sql, binds = values.len(), "Executing query");
    bind_all(sql, values).fetch_all(&mut *conn).await
}

/// Run a statement for its effect.
pub(crate) async fn execute_with_binds(
    conn: &mut SqliteConnection,
    sql: &str,
    values: &[SqlValue],
) -> std::result::Result<SqliteQueryResult, sqlx::Error> {
    tracing::debug!(sql = %sql, binds = values.len(), "Executing statement");
    bind_all(sql, values).execute(&mut *conn).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::filters::{FloatFilter, StringFilter};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn registry() -> &'static SchemaRegistry {
        SchemaRegistry::global()
    }

    fn model(name: &str) -> &'static ModelDef {
        registry().get_entity(name).unwrap()
    }

    fn compile(name: &str, filter: &WhereInput) -> Result<Fragment> {
        QueryCompiler::new(registry()).compile_where(model(name), ROOT, filter)
    }

    #[test]
    fn test_empty_and_is_true_empty_or_is_false() {
        assert_eq!(compile("User", &WhereInput::and([])).unwrap().sql, "1=1");
        assert_eq!(compile("User", &WhereInput::or([])).unwrap().sql, "1=0");
    }

    #[test]
    fn test_not_negates_each_item() {
        let filter = WhereInput::not([
            WhereInput::equals("name", "a"),
            WhereInput::equals("name", "b"),
        ]);
        let fragment = compile("User", &filter).unwrap();
        assert_eq!(
            fragment.sql,
            "(NOT (\"t0\".\"name\" = ?)) AND (NOT (\"t0\".\"name\" = ?))"
        );
        assert_eq!(fragment.values.len(), 2);
    }

    #[test]
    fn test_nested_and_or() {
        let filter = WhereInput::and([
            WhereInput::field("email", StringFilter::ends_with("@b.com")),
            WhereInput::or([
                WhereInput::equals("name", "Ada"),
                WhereInput::equals("image", Value::Null),
            ]),
        ]);
        let fragment = compile("User", &filter).unwrap();
        assert_eq!(
            fragment.sql,
            "(\"t0\".\"email\" GLOB ?) AND ((\"t0\".\"name\" = ?) OR (\"t0\".\"image\" IS NULL))"
        );
        assert_eq!(
            fragment.values,
            vec![
                SqlValue::String("*@b.com".into()),
                SqlValue::String("Ada".into())
            ]
        );
    }

    #[test]
    fn test_filter_type_must_match_field() {
        let filter = WhereInput::field("title", FloatFilter::gt(1.0));
        assert_matches!(compile("Node", &filter), Err(OrmError::InvalidArgument(_)));
    }

    #[test]
    fn test_is_null_rejected_on_required_field() {
        let filter = WhereInput::field("title", StringFilter::is_null(true));
        assert_matches!(compile("Node", &filter), Err(OrmError::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_field() {
        let filter = WhereInput::equals("nope", 1);
        assert_matches!(
            compile("Node", &filter),
            Err(OrmError::UnknownField { field, .. }) if field == "nope"
        );
    }

    #[test]
    fn test_relation_some_uses_exists() {
        let filter = WhereInput::some("children", WhereInput::equals("title", "x"));
        let fragment = compile("Node", &filter).unwrap();
        assert_eq!(
            fragment.sql,
            "EXISTS (SELECT 1 FROM \"node\" AS \"t1\" WHERE \"t1\".\"parent_id\" = \"t0\".\"id\" AND (\"t1\".\"title\" = ?))"
        );
    }

    #[test]
    fn test_relation_is_null_on_owning_side() {
        let fragment = compile("Node", &WhereInput::is("parent", None)).unwrap();
        assert_eq!(fragment.sql, "\"t0\".\"parent_id\" IS NULL");
    }

    #[test]
    fn test_list_operator_rejected_on_to_one() {
        let filter = WhereInput::some("parent", WhereInput::default());
        assert_matches!(compile("Node", &filter), Err(OrmError::InvalidArgument(_)));
    }

    #[test]
    fn test_unique_requires_unique_field() {
        let mut compiler = QueryCompiler::new(registry());
        let err = compiler
            .compile_unique(model("Session"), ROOT, &WhereUniqueInput::new("userId", "u1"))
            .unwrap_err();
        assert_matches!(err, OrmError::InvalidUniqueConstraint { fields, .. } if fields == vec!["userId"]);

        let ok = compiler
            .compile_unique(model("Session"), ROOT, &WhereUniqueInput::new("token", "t"))
            .unwrap();
        assert_eq!(ok.sql, "\"t0\".\"token\" = ?");
    }

    #[test]
    fn test_order_appends_id_tiebreaker() {
        let orders =
            resolve_order(registry(), model("Node"), &[OrderBy::desc("positionX")], true).unwrap();
        assert_eq!(
            order_clause(ROOT, &orders),
            "\"t0\".\"position_x\" DESC, \"t0\".\"id\" ASC"
        );
    }

    #[test]
    fn test_nulls_ordering_requires_nullable() {
        assert_matches!(
            resolve_order(registry(), model("Node"), &[OrderBy::asc("title").nulls_last()], true),
            Err(OrmError::InvalidArgument(_))
        );
        let orders = resolve_order(
            registry(),
            model("Node"),
            &[OrderBy::asc("parentId").nulls_last()],
            false,
        )
        .unwrap();
        assert_eq!(order_clause(ROOT, &orders), "\"t0\".\"parent_id\" ASC NULLS LAST");
    }

    #[test]
    fn test_cursor_condition_on_id_only() {
        let orders = resolve_order(registry(), model("Node"), &[], true).unwrap();
        let mut cursor = Record::new();
        cursor.set("id", "n5");
        let fragment = cursor_condition(ROOT, &orders, &cursor);
        assert_eq!(fragment.sql, "(\"t0\".\"id\" > ?) OR (\"t0\".\"id\" IS ?)");
        assert_eq!(fragment.values.len(), 2);
    }

    #[test]
    fn test_backwards_take_reverses_order() {
        let args = FindManyArgs::new().order_by(OrderBy::asc("title")).take(-2);
        let plan = QueryCompiler::new(registry())
            .plan(model("Node"), &args, None)
            .unwrap();
        assert!(plan.backwards);
        assert!(plan.select_sql().ends_with(
            "ORDER BY \"t0\".\"title\" DESC, \"t0\".\"id\" DESC LIMIT 2"
        ));
    }

    #[test]
    fn test_skip_without_take_uses_unbounded_limit() {
        let args = FindManyArgs::new().skip(3);
        let plan = QueryCompiler::new(registry())
            .plan(model("Model"), &args, None)
            .unwrap();
        assert!(plan.select_sql().ends_with("LIMIT -1 OFFSET 3"));
    }

    #[test]
    fn test_distinct_moves_window_in_memory() {
        let args = FindManyArgs::new().distinct(["title"]).take(1);
        let plan = QueryCompiler::new(registry())
            .plan(model("Node"), &args, None)
            .unwrap();
        assert!(!plan.select_sql().contains("LIMIT"));

        let rows: Vec<Record> = ["a", "a", "b"]
            .iter()
            .enumerate()
            .map(|(i, title)| {
                let mut r = Record::new();
                r.set("id", format!("n{i}"));
                r.set("title", *title);
                r
            })
            .collect();
        let out = plan.finish(rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get_str("title"), Some("a"));
    }

    fn titled(rows: &[(&str, &str)]) -> Vec<Record> {
        rows.iter()
            .map(|(id, title)| {
                let mut r = Record::new();
                r.set("id", *id);
                r.set("title", *title);
                r
            })
            .collect()
    }

    #[test]
    fn test_distinct_backwards_keeps_first_in_requested_order() {
        let args = FindManyArgs::new()
            .order_by(OrderBy::asc("positionX"))
            .distinct(["title"])
            .take(-1);
        let plan = QueryCompiler::new(registry())
            .plan(model("Node"), &args, None)
            .unwrap();
        assert!(!plan.backwards);
        assert!(plan.select_sql().contains("ORDER BY \"t0\".\"position_x\" ASC"));

        let out = plan.finish(titled(&[("n1", "a"), ("n2", "a"), ("n3", "b"), ("n4", "b")]));
        let ids: Vec<_> = out.iter().filter_map(|r| r.get_str("id")).collect();
        assert_eq!(ids, vec!["n3"]);
    }

    #[test]
    fn test_distinct_treats_equal_numbers_as_one() {
        let args = FindManyArgs::new().distinct(["positionX"]);
        let plan = QueryCompiler::new(registry())
            .plan(model("Node"), &args, None)
            .unwrap();
        let mut rows = titled(&[("n1", "a"), ("n2", "b")]);
        rows[0].set("positionX", Value::Float(1.0));
        rows[1].set("positionX", Value::Int(1));
        assert_eq!(plan.finish(rows).len(), 1);
    }

    #[test]
    fn test_extreme_take_does_not_overflow() {
        let args = FindManyArgs::new().take(i64::MIN);
        let plan = QueryCompiler::new(registry())
            .plan(model("Node"), &args, None)
            .unwrap();
        assert!(plan.backwards);
        assert!(plan.select_sql().ends_with(&format!("LIMIT {}", i64::MAX)));

        let distinct = FindManyArgs::new().distinct(["title"]).take(i64::MIN);
        let plan = QueryCompiler::new(registry())
            .plan(model("Node"), &distinct, None)
            .unwrap();
        assert_eq!(plan.finish(titled(&[("n1", "a"), ("n2", "b")])).len(), 2);
    }

    #[test]
    fn test_negative_skip_rejected() {
        let args = FindManyArgs::new().skip(-1);
        assert_matches!(
            QueryCompiler::new(registry()).plan(model("Node"), &args, None),
            Err(OrmError::InvalidArgument(_))
        );
    }

    #[test]
    fn test_projection_select_and_omit_exclusive() {
        let projection = Projection {
            select: Some(vec!["id".into()]),
            omit: vec!["title".into()],
            ..Default::default()
        };
        assert_matches!(
            validate_projection(registry(), model("Node"), &projection),
            Err(OrmError::InvalidArgument(_))
        );
    }
}
