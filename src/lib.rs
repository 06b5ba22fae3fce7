//! roadmap-client
//!
//! A schema-driven data-access client for the roadmap domain, backed by
//! SQLite through sqlx. Every entity in the registry gets a typed delegate
//! with unique lookups, filtered queries with cursor pagination, nested
//! writes, aggregates and groupBy, plus batch and interactive transactions.

// Lets the `Entity` derive refer to `::roadmap_client` from inside this crate.
extern crate self as roadmap_client;

pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod logging;
pub mod orm;
pub mod schema;

pub use client::{Client, Delegate, IsolationLevel, TransactionClient, TransactionOptions};
pub use db::DatabaseConfig;
pub use error::{ErrorCategory, OrmError, Result};
pub use orm::{
    AggregateArgs, AggregateFunction, AggregateResult, AggregateSelection, BoolFilter, CountArgs,
    CreateInput, CreateManyArgs, DateTimeFilter, DeleteManyArgs, FindManyArgs, FindUniqueArgs,
    FloatFilter, GroupByArgs, GroupByRow, HavingInput, IncludeArgs, IntFilter, OrderBy,
    Projection, QueryMode, Record, Related, Sql, StringFilter, UpdateArgs, UpdateInput,
    UpdateManyArgs, UpsertArgs, Value, WhereInput, WhereUniqueInput,
};
