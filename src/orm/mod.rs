//! Schema-driven query layer
//!
//! - `filters` / `args`: typed inputs for every operation
//! - `builder`: compiles inputs into parameterized SQL
//! - `engine`: runs reads and writes against a connection
//! - `aggregate`: count, aggregate and groupBy
//! - `relations`: batched include resolution and lazy loading
//! - `operation`: operations as values for batch transactions
//! - `raw`: parameterized raw SQL

mod aggregate;
pub mod args;
pub(crate) mod builder;
pub mod engine;
pub mod filters;
pub mod operation;
pub mod raw;
pub(crate) mod relations;
pub mod value;

pub use args::{
    AggregateArgs, AggregateFunction, AggregateResult, AggregateSelection, CountArgs,
    CreateInput, CreateManyArgs, DeleteManyArgs, FieldUpdate, FindManyArgs, FindUniqueArgs,
    GroupByArgs, GroupByRow, HavingInput, IncludeArgs, NullsOrder, OrderBy, Projection,
    RelationWrite, SortOrder, UpdateArgs, UpdateInput, UpdateManyArgs, UpsertArgs,
};
pub use engine::Engine;
pub use filters::{
    BoolFilter, DateTimeFilter, FloatFilter, IntFilter, QueryMode, RelationFilter, ScalarFilter,
    StringFilter, WhereInput, WhereUniqueInput,
};
pub use operation::{Action, Operation, OperationOutput};
pub use raw::Sql;
pub use value::{Record, Related, Value};
