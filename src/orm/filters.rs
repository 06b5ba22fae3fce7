//! Filter input types
//!
//! Scalar filters follow the usual ORM operator set:
//! - equals, in, notIn
//! - lt, lte, gt, gte
//! - contains, startsWith, endsWith (strings, with a case-sensitivity mode)
//! - not (nested negation), isNull (nullable fields only)
//!
//! `WhereInput` composes them with AND/OR/NOT and relation filters;
//! `WhereUniqueInput` identifies a single row and must name a unique field.
//! Compilation to SQL happens in `orm::builder`, which checks every filter
//! against the model's input shapes first.

use chrono::{DateTime, Utc};

use crate::db::sqlite_helpers::datetime_to_str;
use crate::orm::value::{SqlValue, Value};
use crate::schema::FieldType;
use crate::schema::shapes::FilterOperator;

/// SQL conditions (joined with AND) and the values they bind, in order.
pub type Conditions = (Vec<String>, Vec<SqlValue>);

// ============================================================================
// Condition collection
// ============================================================================

#[derive(Default)]
struct ConditionSet {
    sql: Vec<String>,
    values: Vec<SqlValue>,
}

impl ConditionSet {
    fn compare(&mut self, expr: &str, op: &str, value: SqlValue) {
        self.sql.push(format!("{expr} {op} ?"));
        self.values.push(value);
    }

    fn compare_wrapped(&mut self, expr: &str, op: &str, value: SqlValue, wrap: Option<&str>) {
        match wrap {
            Some(func) => {
                self.sql.push(format!("{func}({expr}) {op} {func}(?)"));
                self.values.push(value);
            }
            None => self.compare(expr, op, value),
        }
    }

    fn list(&mut self, expr: &str, negate: bool, values: Vec<SqlValue>, wrap: Option<&str>) {
        if values.is_empty() {
            // x IN () matches nothing, x NOT IN () matches everything
            if !negate {
                self.sql.push("1=0".to_string());
            }
            return;
        }
        let placeholder = match wrap {
            Some(func) => format!("{func}(?)"),
            None => "?".to_string(),
        };
        let placeholders = vec![placeholder; values.len()].join(", ");
        let expr = match wrap {
            Some(func) => format!("{func}({expr})"),
            None => expr.to_string(),
        };
        let op = if negate { "NOT IN" } else { "IN" };
        self.sql.push(format!("{expr} {op} ({placeholders})"));
        self.values.extend(values);
    }

    fn null_check(&mut self, expr: &str, is_null: bool) {
        if is_null {
            self.sql.push(format!("{expr} IS NULL"));
        } else {
            self.sql.push(format!("{expr} IS NOT NULL"));
        }
    }

    fn negate(&mut self, (sql, values): Conditions) {
        if sql.is_empty() {
            return;
        }
        self.sql.push(format!("NOT ({})", sql.join(" AND ")));
        self.values.extend(values);
    }

    fn finish(self) -> Conditions {
        (self.sql, self.values)
    }
}

/// Escape GLOB metacharacters so the pattern matches literally.
fn glob_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '*' | '?' | '[' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Escape LIKE metacharacters for use with `ESCAPE '\'`.
fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// String filter
// ============================================================================

/// Case sensitivity for string comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

/// Filter for string fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringFilter {
    pub equals: Option<String>,
    pub in_list: Option<Vec<String>>,
    pub not_in: Option<Vec<String>>,
    pub lt: Option<String>,
    pub lte: Option<String>,
    pub gt: Option<String>,
    pub gte: Option<String>,
    pub contains: Option<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    pub mode: QueryMode,
    pub is_null: Option<bool>,
    pub not: Option<Box<StringFilter>>,
}

impl StringFilter {
    pub fn equals(value: impl Into<String>) -> Self {
        Self {
            equals: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn not_equals(value: impl Into<String>) -> Self {
        Self {
            not: Some(Box::new(Self::equals(value))),
            ..Default::default()
        }
    }

    pub fn in_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            in_list: Some(values.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn not_in<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            not_in: Some(values.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            contains: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn starts_with(value: impl Into<String>) -> Self {
        Self {
            starts_with: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn ends_with(value: impl Into<String>) -> Self {
        Self {
            ends_with: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn gt(value: impl Into<String>) -> Self {
        Self {
            gt: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn lt(value: impl Into<String>) -> Self {
        Self {
            lt: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn is_null(is_null: bool) -> Self {
        Self {
            is_null: Some(is_null),
            ..Default::default()
        }
    }

    /// Compare without regard to ASCII case
    pub fn insensitive(mut self) -> Self {
        self.mode = QueryMode::Insensitive;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operators().is_empty()
    }

    pub fn operators(&self) -> Vec<FilterOperator> {
        let mut ops = Vec::new();
        let checks = [
            (self.equals.is_some(), FilterOperator::Equals),
            (self.in_list.is_some(), FilterOperator::In),
            (self.not_in.is_some(), FilterOperator::NotIn),
            (self.lt.is_some(), FilterOperator::Lt),
            (self.lte.is_some(), FilterOperator::Lte),
            (self.gt.is_some(), FilterOperator::Gt),
            (self.gte.is_some(), FilterOperator::Gte),
            (self.contains.is_some(), FilterOperator::Contains),
            (self.starts_with.is_some(), FilterOperator::StartsWith),
            (self.ends_with.is_some(), FilterOperator::EndsWith),
            (self.mode != QueryMode::Default, FilterOperator::Mode),
            (self.is_null.is_some(), FilterOperator::IsNull),
        ];
        ops.extend(checks.into_iter().filter(|(set, _)| *set).map(|(_, op)| op));
        if let Some(inner) = &self.not {
            ops.push(FilterOperator::Not);
            ops.extend(inner.operators());
        }
        ops
    }

    pub fn to_sql_conditions(&self, expr: &str) -> Conditions {
        let mut set = ConditionSet::default();
        let insensitive = self.mode == QueryMode::Insensitive;
        let wrap = insensitive.then_some("LOWER");
        let text = |s: &String| SqlValue::String(s.clone());

        if let Some(v) = &self.equals {
            set.compare_wrapped(expr, "=", text(v), wrap);
        }
        if let Some(list) = &self.in_list {
            set.list(expr, false, list.iter().map(text).collect(), wrap);
        }
        if let Some(list) = &self.not_in {
            set.list(expr, true, list.iter().map(text).collect(), wrap);
        }
        for (op, value) in [("<", &self.lt), ("<=", &self.lte), (">", &self.gt), (">=", &self.gte)] {
            if let Some(v) = value {
                set.compare_wrapped(expr, op, text(v), wrap);
            }
        }

        let patterns = [
            (&self.contains, true, true),
            (&self.starts_with, false, true),
            (&self.ends_with, true, false),
        ];
        for (value, leading, trailing) in patterns {
            let Some(v) = value else { continue };
            if insensitive {
                let pattern = format!(
                    "{}{}{}",
                    if leading { "%" } else { "" },
                    like_escape(v),
                    if trailing { "%" } else { "" }
                );
                set.sql.push(format!("{expr} LIKE ? ESCAPE '\\'"));
                set.values.push(SqlValue::String(pattern));
            } else {
                let pattern = format!(
                    "{}{}{}",
                    if leading { "*" } else { "" },
                    glob_escape(v),
                    if trailing { "*" } else { "" }
                );
                set.compare(expr, "GLOB", SqlValue::String(pattern));
            }
        }

        if let Some(is_null) = self.is_null {
            set.null_check(expr, is_null);
        }
        if let Some(inner) = &self.not {
            let mut inner = inner.as_ref().clone();
            if inner.mode == QueryMode::Default {
                inner.mode = self.mode;
            }
            set.negate(inner.to_sql_conditions(expr));
        }
        set.finish()
    }
}

// ============================================================================
// Ordered scalar filters (Int, Float, DateTime)
// ============================================================================

macro_rules! ordered_filter {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $to_sql:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            pub equals: Option<$ty>,
            pub in_list: Option<Vec<$ty>>,
            pub not_in: Option<Vec<$ty>>,
            pub lt: Option<$ty>,
            pub lte: Option<$ty>,
            pub gt: Option<$ty>,
            pub gte: Option<$ty>,
            pub is_null: Option<bool>,
            pub not: Option<Box<$name>>,
        }

        impl $name {
            pub fn equals(value: $ty) -> Self {
                Self { equals: Some(value), ..Default::default() }
            }

            pub fn not_equals(value: $ty) -> Self {
                Self { not: Some(Box::new(Self::equals(value))), ..Default::default() }
            }

            pub fn in_list(values: impl IntoIterator<Item = $ty>) -> Self {
                Self { in_list: Some(values.into_iter().collect()), ..Default::default() }
            }

            pub fn not_in(values: impl IntoIterator<Item = $ty>) -> Self {
                Self { not_in: Some(values.into_iter().collect()), ..Default::default() }
            }

            pub fn lt(value: $ty) -> Self {
                Self { lt: Some(value), ..Default::default() }
            }

            pub fn lte(value: $ty) -> Self {
                Self { lte: Some(value), ..Default::default() }
            }

            pub fn gt(value: $ty) -> Self {
                Self { gt: Some(value), ..Default::default() }
            }

            pub fn gte(value: $ty) -> Self {
                Self { gte: Some(value), ..Default::default() }
            }

            /// Inclusive range
            pub fn between(low: $ty, high: $ty) -> Self {
                Self { gte: Some(low), lte: Some(high), ..Default::default() }
            }

            pub fn is_null(is_null: bool) -> Self {
                Self { is_null: Some(is_null), ..Default::default() }
            }

            pub fn is_empty(&self) -> bool {
                self.operators().is_empty()
            }

            pub fn operators(&self) -> Vec<FilterOperator> {
                let checks = [
                    (self.equals.is_some(), FilterOperator::Equals),
                    (self.in_list.is_some(), FilterOperator::In),
                    (self.not_in.is_some(), FilterOperator::NotIn),
                    (self.lt.is_some(), FilterOperator::Lt),
                    (self.lte.is_some(), FilterOperator::Lte),
                    (self.gt.is_some(), FilterOperator::Gt),
                    (self.gte.is_some(), FilterOperator::Gte),
                    (self.is_null.is_some(), FilterOperator::IsNull),
                ];
                let mut ops: Vec<_> = checks.into_iter().filter(|(set, _)| *set).map(|(_, op)| op).collect();
                if let Some(inner) = &self.not {
                    ops.push(FilterOperator::Not);
                    ops.extend(inner.operators());
                }
                ops
            }

            pub fn to_sql_conditions(&self, expr: &str) -> Conditions {
                let to_sql: fn(&$ty) -> SqlValue = $to_sql;
                let mut set = ConditionSet::default();
                if let Some(v) = &self.equals {
                    set.compare(expr, "=", to_sql(v));
                }
                if let Some(list) = &self.in_list {
                    set.list(expr, false, list.iter().map(to_sql).collect(), None);
                }
                if let Some(list) = &self.not_in {
                    set.list(expr, true, list.iter().map(to_sql).collect(), None);
                }
                for (op, value) in [("<", &self.lt), ("<=", &self.lte), (">", &self.gt), (">=", &self.gte)] {
                    if let Some(v) = value {
                        set.compare(expr, op, to_sql(v));
                    }
                }
                if let Some(is_null) = self.is_null {
                    set.null_check(expr, is_null);
                }
                if let Some(inner) = &self.not {
                    set.negate(inner.to_sql_conditions(expr));
                }
                set.finish()
            }
        }
    };
}

ordered_filter!(
    /// Filter for integer fields
    IntFilter,
    i64,
    |v| SqlValue::Int(*v)
);

ordered_filter!(
    /// Filter for float fields
    FloatFilter,
    f64,
    |v| SqlValue::Float(*v)
);

ordered_filter!(
    /// Filter for timestamp fields
    DateTimeFilter,
    DateTime<Utc>,
    |v| SqlValue::String(datetime_to_str(*v))
);

// ============================================================================
// Boolean filter
// ============================================================================

/// Filter for boolean fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolFilter {
    pub equals: Option<bool>,
    pub is_null: Option<bool>,
    pub not: Option<Box<BoolFilter>>,
}

impl BoolFilter {
    pub fn equals(value: bool) -> Self {
        Self {
            equals: Some(value),
            ..Default::default()
        }
    }

    pub fn is_true() -> Self {
        Self::equals(true)
    }

    pub fn is_false() -> Self {
        Self::equals(false)
    }

    pub fn operators(&self) -> Vec<FilterOperator> {
        let mut ops = Vec::new();
        if self.equals.is_some() {
            ops.push(FilterOperator::Equals);
        }
        if self.is_null.is_some() {
            ops.push(FilterOperator::IsNull);
        }
        if let Some(inner) = &self.not {
            ops.push(FilterOperator::Not);
            ops.extend(inner.operators());
        }
        ops
    }

    pub fn to_sql_conditions(&self, expr: &str) -> Conditions {
        let mut set = ConditionSet::default();
        if let Some(b) = self.equals {
            set.compare(expr, "=", SqlValue::Bool(b));
        }
        if let Some(is_null) = self.is_null {
            set.null_check(expr, is_null);
        }
        if let Some(inner) = &self.not {
            set.negate(inner.to_sql_conditions(expr));
        }
        set.finish()
    }
}

// ============================================================================
// Scalar filter
// ============================================================================

/// A filter on one scalar field; the variant must match the field's type.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarFilter {
    String(StringFilter),
    Int(IntFilter),
    Float(FloatFilter),
    Bool(BoolFilter),
    DateTime(DateTimeFilter),
}

impl ScalarFilter {
    pub fn field_type(&self) -> FieldType {
        match self {
            ScalarFilter::String(_) => FieldType::String,
            ScalarFilter::Int(_) => FieldType::Int,
            ScalarFilter::Float(_) => FieldType::Float,
            ScalarFilter::Bool(_) => FieldType::Boolean,
            ScalarFilter::DateTime(_) => FieldType::DateTime,
        }
    }

    pub fn operators(&self) -> Vec<FilterOperator> {
        match self {
            ScalarFilter::String(f) => f.operators(),
            ScalarFilter::Int(f) => f.operators(),
            ScalarFilter::Float(f) => f.operators(),
            ScalarFilter::Bool(f) => f.operators(),
            ScalarFilter::DateTime(f) => f.operators(),
        }
    }

    pub fn to_sql_conditions(&self, expr: &str) -> Conditions {
        match self {
            ScalarFilter::String(f) => f.to_sql_conditions(expr),
            ScalarFilter::Int(f) => f.to_sql_conditions(expr),
            ScalarFilter::Float(f) => f.to_sql_conditions(expr),
            ScalarFilter::Bool(f) => f.to_sql_conditions(expr),
            ScalarFilter::DateTime(f) => f.to_sql_conditions(expr),
        }
    }
}

impl From<StringFilter> for ScalarFilter {
    fn from(f: StringFilter) -> Self {
        ScalarFilter::String(f)
    }
}

impl From<IntFilter> for ScalarFilter {
    fn from(f: IntFilter) -> Self {
        ScalarFilter::Int(f)
    }
}

impl From<FloatFilter> for ScalarFilter {
    fn from(f: FloatFilter) -> Self {
        ScalarFilter::Float(f)
    }
}

impl From<BoolFilter> for ScalarFilter {
    fn from(f: BoolFilter) -> Self {
        ScalarFilter::Bool(f)
    }
}

impl From<DateTimeFilter> for ScalarFilter {
    fn from(f: DateTimeFilter) -> Self {
        ScalarFilter::DateTime(f)
    }
}

// ============================================================================
// Where inputs
// ============================================================================

/// Filter on a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationFilter {
    /// At least one related row matches (list relations)
    Some(Box<WhereInput>),
    /// Every related row matches; vacuously true with no rows (list relations)
    Every(Box<WhereInput>),
    /// No related row matches (list relations)
    None(Box<WhereInput>),
    /// The related row exists and matches, or is absent when `None` (to-one)
    Is(Option<Box<WhereInput>>),
    /// The related row does not match, or is present when `None` (to-one)
    IsNot(Option<Box<WhereInput>>),
}

/// Filter expression over one model.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereInput {
    /// All must hold; empty is true
    And(Vec<WhereInput>),
    /// Any must hold; empty is false
    Or(Vec<WhereInput>),
    /// None may hold
    Not(Vec<WhereInput>),
    Field { field: String, filter: ScalarFilter },
    /// Shorthand equality; `Value::Null` tests for null
    Equals { field: String, value: Value },
    Relation { relation: String, filter: RelationFilter },
}

impl Default for WhereInput {
    fn default() -> Self {
        WhereInput::And(Vec::new())
    }
}

impl WhereInput {
    pub fn field(field: impl Into<String>, filter: impl Into<ScalarFilter>) -> Self {
        WhereInput::Field {
            field: field.into(),
            filter: filter.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        WhereInput::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn and(items: impl IntoIterator<Item = WhereInput>) -> Self {
        WhereInput::And(items.into_iter().collect())
    }

    pub fn or(items: impl IntoIterator<Item = WhereInput>) -> Self {
        WhereInput::Or(items.into_iter().collect())
    }

    pub fn not(items: impl IntoIterator<Item = WhereInput>) -> Self {
        WhereInput::Not(items.into_iter().collect())
    }

    pub fn some(relation: impl Into<String>, filter: WhereInput) -> Self {
        Self::relation(relation, RelationFilter::Some(Box::new(filter)))
    }

    pub fn every(relation: impl Into<String>, filter: WhereInput) -> Self {
        Self::relation(relation, RelationFilter::Every(Box::new(filter)))
    }

    pub fn none(relation: impl Into<String>, filter: WhereInput) -> Self {
        Self::relation(relation, RelationFilter::None(Box::new(filter)))
    }

    pub fn is(relation: impl Into<String>, filter: Option<WhereInput>) -> Self {
        Self::relation(relation, RelationFilter::Is(filter.map(Box::new)))
    }

    pub fn is_not(relation: impl Into<String>, filter: Option<WhereInput>) -> Self {
        Self::relation(relation, RelationFilter::IsNot(filter.map(Box::new)))
    }

    fn relation(relation: impl Into<String>, filter: RelationFilter) -> Self {
        WhereInput::Relation {
            relation: relation.into(),
            filter,
        }
    }
}

/// Identifies at most one row: field/value pairs, at least one of them on a
/// unique field, plus an optional extra filter.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereUniqueInput {
    pub(crate) keys: Vec<(String, Value)>,
    pub(crate) filter: Option<Box<WhereInput>>,
}

impl WhereUniqueInput {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            keys: vec![(field.into(), value.into())],
            filter: None,
        }
    }

    pub fn id(value: impl Into<Value>) -> Self {
        Self::new("id", value)
    }

    pub fn and_key(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keys.push((field.into(), value.into()));
        self
    }

    pub fn and_where(mut self, filter: WhereInput) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn key_fields(&self) -> Vec<&str> {
        self.keys.iter().map(|(k, _)| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_equals() {
        let (sql, values) = StringFilter::equals("Ada").to_sql_conditions("\"t0\".\"name\"");
        assert_eq!(sql, vec!["\"t0\".\"name\" = ?"]);
        assert_eq!(values, vec![SqlValue::String("Ada".into())]);
    }

    #[test]
    fn test_string_contains_is_case_sensitive_glob() {
        let (sql, values) = StringFilter::contains("a*b").to_sql_conditions("c");
        assert_eq!(sql, vec!["c GLOB ?"]);
        assert_eq!(values, vec![SqlValue::String("*a[*]b*".into())]);
    }

    #[test]
    fn test_string_insensitive_uses_like() {
        let (sql, values) = StringFilter::starts_with("50%")
            .insensitive()
            .to_sql_conditions("c");
        assert_eq!(sql, vec!["c LIKE ? ESCAPE '\\'"]);
        assert_eq!(values, vec![SqlValue::String("50\\%%".into())]);

        let (sql, _) = StringFilter::equals("ADA").insensitive().to_sql_conditions("c");
        assert_eq!(sql, vec!["LOWER(c) = LOWER(?)"]);
    }

    #[test]
    fn test_string_not_inherits_mode() {
        let filter = StringFilter {
            mode: QueryMode::Insensitive,
            ..StringFilter::not_equals("x")
        };
        let (sql, _) = filter.to_sql_conditions("c");
        assert_eq!(sql, vec!["NOT (LOWER(c) = LOWER(?))"]);
        assert_eq!(
            filter.operators(),
            vec![FilterOperator::Mode, FilterOperator::Not, FilterOperator::Equals]
        );
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let (sql, values) = StringFilter::in_list(Vec::<String>::new()).to_sql_conditions("c");
        assert_eq!(sql, vec!["1=0"]);
        assert!(values.is_empty());

        let (sql, _) = StringFilter::not_in(Vec::<String>::new()).to_sql_conditions("c");
        assert!(sql.is_empty());
    }

    #[test]
    fn test_float_range() {
        let (sql, values) = FloatFilter::between(1.0, 2.5).to_sql_conditions("x");
        assert_eq!(sql, vec!["x <= ?", "x >= ?"]);
        assert_eq!(values, vec![SqlValue::Float(2.5), SqlValue::Float(1.0)]);
    }

    #[test]
    fn test_int_in_list() {
        let (sql, values) = IntFilter::in_list([1, 2, 3]).to_sql_conditions("x");
        assert_eq!(sql, vec!["x IN (?, ?, ?)"]);
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_datetime_binds_stored_format() {
        use chrono::TimeZone;
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let (sql, values) = DateTimeFilter::gt(dt).to_sql_conditions("d");
        assert_eq!(sql, vec!["d > ?"]);
        assert_eq!(
            values,
            vec![SqlValue::String("2024-03-01T00:00:00.000000000Z".into())]
        );
    }

    #[test]
    fn test_bool_filter() {
        let (sql, values) = BoolFilter::is_true().to_sql_conditions("b");
        assert_eq!(sql, vec!["b = ?"]);
        assert_eq!(values, vec![SqlValue::Bool(true)]);
    }

    #[test]
    fn test_is_null_filter() {
        let (sql, values) = StringFilter::is_null(true).to_sql_conditions("p");
        assert_eq!(sql, vec!["p IS NULL"]);
        assert!(values.is_empty());
        assert_eq!(
            ScalarFilter::from(FloatFilter::is_null(false)).operators(),
            vec![FilterOperator::IsNull]
        );
    }

    #[test]
    fn test_where_unique_keys() {
        let unique = WhereUniqueInput::id("u1").and_key("email", "a@b.com");
        assert_eq!(unique.key_fields(), vec!["id", "email"]);
    }

    #[test]
    fn test_where_default_is_empty_and() {
        assert_eq!(WhereInput::default(), WhereInput::And(vec![]));
    }
}
