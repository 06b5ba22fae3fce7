//! Operation arguments: ordering, projection, pagination and write payloads.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::orm::filters::{ScalarFilter, WhereInput, WhereUniqueInput};
use crate::orm::value::{Record, Value};
use crate::schema::SchemaRegistry;
use crate::schema::shapes::RelationWriteKind;

// ============================================================================
// Ordering
// ============================================================================

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn reverse(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub order: SortOrder,
    /// Only valid on nullable fields
    pub nulls: Option<NullsOrder>,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
            nulls: None,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }
}

// ============================================================================
// Projection
// ============================================================================

/// Arguments for one included relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeArgs {
    pub filter: Option<WhereInput>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
    pub projection: Projection,
}

impl IncludeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn include(mut self, relation: impl Into<String>, args: IncludeArgs) -> Self {
        self.projection.include.insert(relation.into(), args);
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// Which scalar fields to return and which relations to resolve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Whitelist of scalar fields
    pub select: Option<Vec<String>>,
    /// Blacklist of scalar fields; exclusive with `select`
    pub omit: Vec<String>,
    pub include: BTreeMap<String, IncludeArgs>,
}

impl Projection {
    pub fn is_default(&self) -> bool {
        self.select.is_none() && self.omit.is_empty() && self.include.is_empty()
    }
}

macro_rules! projection_builders {
    ($ty:ty) => {
        impl $ty {
            /// Resolve a relation on every returned row
            pub fn include(mut self, relation: impl Into<String>, args: IncludeArgs) -> Self {
                self.projection.include.insert(relation.into(), args);
                self
            }

            /// Return only these scalar fields
            pub fn select<I, S>(mut self, fields: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.projection.select = Some(fields.into_iter().map(Into::into).collect());
                self
            }

            /// Leave these scalar fields out
            pub fn omit<I, S>(mut self, fields: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.projection.omit.extend(fields.into_iter().map(Into::into));
                self
            }
        }
    };
}

// ============================================================================
// Reads
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FindUniqueArgs {
    pub filter: WhereUniqueInput,
    pub projection: Projection,
}

impl FindUniqueArgs {
    pub fn new(filter: WhereUniqueInput) -> Self {
        Self {
            filter,
            projection: Projection::default(),
        }
    }
}

impl From<WhereUniqueInput> for FindUniqueArgs {
    fn from(filter: WhereUniqueInput) -> Self {
        Self::new(filter)
    }
}

projection_builders!(FindUniqueArgs);

/// Arguments for findMany / findFirst.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindManyArgs {
    pub filter: Option<WhereInput>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<WhereUniqueInput>,
    /// Negative values take rows backwards from the cursor (or the end)
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub distinct: Vec<String>,
    pub projection: Projection,
}

impl FindManyArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn cursor(mut self, cursor: WhereUniqueInput) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn distinct<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distinct = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl From<WhereInput> for FindManyArgs {
    fn from(filter: WhereInput) -> Self {
        Self::new().filter(filter)
    }
}

projection_builders!(FindManyArgs);

// ============================================================================
// Writes
// ============================================================================

/// Nested write on a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationWrite {
    /// Link an existing row
    Connect(WhereUniqueInput),
    /// Create a new related row
    Create(Box<CreateInput>),
    /// Link several existing rows (list relations)
    ConnectMany(Vec<WhereUniqueInput>),
    /// Create several related rows (list relations)
    CreateMany(Vec<CreateInput>),
    /// Unlink an optional to-one relation
    Disconnect,
}

impl RelationWrite {
    pub fn kind(&self) -> RelationWriteKind {
        match self {
            RelationWrite::Connect(_) => RelationWriteKind::Connect,
            RelationWrite::Create(_) => RelationWriteKind::Create,
            RelationWrite::ConnectMany(_) => RelationWriteKind::ConnectMany,
            RelationWrite::CreateMany(_) => RelationWriteKind::CreateMany,
            RelationWrite::Disconnect => RelationWriteKind::Disconnect,
        }
    }
}

/// Create payload: scalar fields plus nested relation writes. A foreign key
/// may be given as a scalar or through its relation, not both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateInput {
    pub(crate) scalars: BTreeMap<String, Value>,
    pub(crate) relations: BTreeMap<String, RelationWrite>,
}

impl CreateInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload from a typed entity; relation fields are ignored.
    pub fn from_entity<M: crate::entities::Entity>(entity: &M) -> Result<Self> {
        let model = SchemaRegistry::global().get_entity(M::MODEL)?;
        let record = Record::from_entity(model, entity)?;
        Ok(Self {
            scalars: record.values().clone(),
            relations: BTreeMap::new(),
        })
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.scalars.insert(field.into(), value.into());
        self
    }

    pub fn connect(mut self, relation: impl Into<String>, target: WhereUniqueInput) -> Self {
        self.relations
            .insert(relation.into(), RelationWrite::Connect(target));
        self
    }

    pub fn create(mut self, relation: impl Into<String>, data: CreateInput) -> Self {
        self.relations
            .insert(relation.into(), RelationWrite::Create(Box::new(data)));
        self
    }

    pub fn create_many(mut self, relation: impl Into<String>, data: Vec<CreateInput>) -> Self {
        self.relations
            .insert(relation.into(), RelationWrite::CreateMany(data));
        self
    }

    pub fn connect_many(
        mut self,
        relation: impl Into<String>,
        targets: Vec<WhereUniqueInput>,
    ) -> Self {
        self.relations
            .insert(relation.into(), RelationWrite::ConnectMany(targets));
        self
    }

    pub fn scalars(&self) -> &BTreeMap<String, Value> {
        &self.scalars
    }
}

/// Change to one scalar field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Set(Value),
    Increment(f64),
    Decrement(f64),
    Multiply(f64),
    Divide(f64),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateInput {
    pub(crate) fields: BTreeMap<String, FieldUpdate>,
    pub(crate) relations: BTreeMap<String, RelationWrite>,
}

impl UpdateInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(field.into(), FieldUpdate::Set(value.into()));
        self
    }

    pub fn increment(mut self, field: impl Into<String>, by: f64) -> Self {
        self.fields.insert(field.into(), FieldUpdate::Increment(by));
        self
    }

    pub fn decrement(mut self, field: impl Into<String>, by: f64) -> Self {
        self.fields.insert(field.into(), FieldUpdate::Decrement(by));
        self
    }

    pub fn multiply(mut self, field: impl Into<String>, by: f64) -> Self {
        self.fields.insert(field.into(), FieldUpdate::Multiply(by));
        self
    }

    pub fn divide(mut self, field: impl Into<String>, by: f64) -> Self {
        self.fields.insert(field.into(), FieldUpdate::Divide(by));
        self
    }

    pub fn connect(mut self, relation: impl Into<String>, target: WhereUniqueInput) -> Self {
        self.relations
            .insert(relation.into(), RelationWrite::Connect(target));
        self
    }

    pub fn create(mut self, relation: impl Into<String>, data: CreateInput) -> Self {
        self.relations
            .insert(relation.into(), RelationWrite::Create(Box::new(data)));
        self
    }

    pub fn create_many(mut self, relation: impl Into<String>, data: Vec<CreateInput>) -> Self {
        self.relations
            .insert(relation.into(), RelationWrite::CreateMany(data));
        self
    }

    pub fn connect_many(
        mut self,
        relation: impl Into<String>,
        targets: Vec<WhereUniqueInput>,
    ) -> Self {
        self.relations
            .insert(relation.into(), RelationWrite::ConnectMany(targets));
        self
    }

    pub fn disconnect(mut self, relation: impl Into<String>) -> Self {
        self.relations
            .insert(relation.into(), RelationWrite::Disconnect);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.relations.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateManyArgs {
    pub data: Vec<CreateInput>,
    /// Skip rows that collide with a unique constraint instead of failing
    pub skip_duplicates: bool,
}

impl CreateManyArgs {
    pub fn new(data: Vec<CreateInput>) -> Self {
        Self {
            data,
            skip_duplicates: false,
        }
    }

    pub fn skip_duplicates(mut self) -> Self {
        self.skip_duplicates = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateArgs {
    pub filter: WhereUniqueInput,
    pub data: UpdateInput,
    pub projection: Projection,
}

impl UpdateArgs {
    pub fn new(filter: WhereUniqueInput, data: UpdateInput) -> Self {
        Self {
            filter,
            data,
            projection: Projection::default(),
        }
    }
}

projection_builders!(UpdateArgs);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateManyArgs {
    pub filter: Option<WhereInput>,
    pub data: UpdateInput,
    /// Maximum number of rows to update
    pub limit: Option<i64>,
}

impl UpdateManyArgs {
    pub fn new(filter: WhereInput, data: UpdateInput) -> Self {
        Self {
            filter: Some(filter),
            data,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertArgs {
    pub filter: WhereUniqueInput,
    pub create: CreateInput,
    pub update: UpdateInput,
    pub projection: Projection,
}

impl UpsertArgs {
    pub fn new(filter: WhereUniqueInput, create: CreateInput, update: UpdateInput) -> Self {
        Self {
            filter,
            create,
            update,
            projection: Projection::default(),
        }
    }
}

projection_builders!(UpsertArgs);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteManyArgs {
    pub filter: Option<WhereInput>,
    /// Maximum number of rows to delete
    pub limit: Option<i64>,
}

impl DeleteManyArgs {
    pub fn new(filter: WhereInput) -> Self {
        Self {
            filter: Some(filter),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ============================================================================
// Aggregates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Min,
    Max,
    Avg,
    Sum,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "_count",
            AggregateFunction::Min => "_min",
            AggregateFunction::Max => "_max",
            AggregateFunction::Avg => "_avg",
            AggregateFunction::Sum => "_sum",
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Sum => "SUM",
        }
    }
}

/// Which aggregates to compute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSelection {
    /// `_count: { _all: true }`
    pub count_all: bool,
    pub count: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
    pub avg: Vec<String>,
    pub sum: Vec<String>,
}

impl AggregateSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_all(mut self) -> Self {
        self.count_all = true;
        self
    }

    pub fn count(mut self, field: impl Into<String>) -> Self {
        self.count.push(field.into());
        self
    }

    pub fn min(mut self, field: impl Into<String>) -> Self {
        self.min.push(field.into());
        self
    }

    pub fn max(mut self, field: impl Into<String>) -> Self {
        self.max.push(field.into());
        self
    }

    pub fn avg(mut self, field: impl Into<String>) -> Self {
        self.avg.push(field.into());
        self
    }

    pub fn sum(mut self, field: impl Into<String>) -> Self {
        self.sum.push(field.into());
        self
    }

    /// (function, field) pairs in a stable order
    pub(crate) fn entries(&self) -> Vec<(AggregateFunction, &str)> {
        let mut out = Vec::new();
        for (func, fields) in [
            (AggregateFunction::Count, &self.count),
            (AggregateFunction::Min, &self.min),
            (AggregateFunction::Max, &self.max),
            (AggregateFunction::Avg, &self.avg),
            (AggregateFunction::Sum, &self.sum),
        ] {
            out.extend(fields.iter().map(|f| (func, f.as_str())));
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateArgs {
    pub filter: Option<WhereInput>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<WhereUniqueInput>,
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub select: AggregateSelection,
}

impl AggregateArgs {
    pub fn new(select: AggregateSelection) -> Self {
        Self {
            select,
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub(crate) fn window(&self) -> FindManyArgs {
        FindManyArgs {
            filter: self.filter.clone(),
            order_by: self.order_by.clone(),
            cursor: self.cursor.clone(),
            take: self.take,
            skip: self.skip,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountArgs {
    pub filter: Option<WhereInput>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<WhereUniqueInput>,
    pub take: Option<i64>,
    pub skip: Option<i64>,
}

impl CountArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }

    pub(crate) fn window(&self) -> FindManyArgs {
        FindManyArgs {
            filter: self.filter.clone(),
            order_by: self.order_by.clone(),
            cursor: self.cursor.clone(),
            take: self.take,
            skip: self.skip,
            ..Default::default()
        }
    }
}

impl From<WhereInput> for CountArgs {
    fn from(filter: WhereInput) -> Self {
        Self::new().filter(filter)
    }
}

/// Post-aggregation filter for groupBy.
#[derive(Debug, Clone, PartialEq)]
pub enum HavingInput {
    And(Vec<HavingInput>),
    Or(Vec<HavingInput>),
    Not(Vec<HavingInput>),
    /// Condition on a group key, or on an aggregate of it when `aggregate` is set
    Field {
        field: String,
        aggregate: Option<AggregateFunction>,
        filter: ScalarFilter,
    },
}

impl HavingInput {
    pub fn field(field: impl Into<String>, filter: impl Into<ScalarFilter>) -> Self {
        HavingInput::Field {
            field: field.into(),
            aggregate: None,
            filter: filter.into(),
        }
    }

    pub fn aggregate(
        field: impl Into<String>,
        aggregate: AggregateFunction,
        filter: impl Into<ScalarFilter>,
    ) -> Self {
        HavingInput::Field {
            field: field.into(),
            aggregate: Some(aggregate),
            filter: filter.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupByArgs {
    pub by: Vec<String>,
    pub filter: Option<WhereInput>,
    pub having: Option<HavingInput>,
    pub order_by: Vec<OrderBy>,
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub select: AggregateSelection,
}

impl GroupByArgs {
    pub fn new<I, S>(by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            by: by.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn having(mut self, having: HavingInput) -> Self {
        self.having = Some(having);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn aggregate(mut self, select: AggregateSelection) -> Self {
        self.select = select;
        self
    }
}

/// Aggregate values keyed by field name (`_all` for the row count).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    #[serde(rename = "_count", skip_serializing_if = "BTreeMap::is_empty")]
    pub count: BTreeMap<String, i64>,
    #[serde(rename = "_min", skip_serializing_if = "BTreeMap::is_empty")]
    pub min: BTreeMap<String, Value>,
    #[serde(rename = "_max", skip_serializing_if = "BTreeMap::is_empty")]
    pub max: BTreeMap<String, Value>,
    #[serde(rename = "_avg", skip_serializing_if = "BTreeMap::is_empty")]
    pub avg: BTreeMap<String, Value>,
    #[serde(rename = "_sum", skip_serializing_if = "BTreeMap::is_empty")]
    pub sum: BTreeMap<String, Value>,
}

/// One groupBy row: the group key values and the requested aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupByRow {
    #[serde(flatten)]
    pub keys: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub aggregates: AggregateResult,
}

impl GroupByRow {
    pub fn key(&self, field: &str) -> Option<&Value> {
        self.keys.get(field)
    }
}
