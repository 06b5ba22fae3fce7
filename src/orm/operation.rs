//! Operations as values, for batch transactions.

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::error::{OrmError, Result};
use crate::orm::args::{
    AggregateArgs, AggregateResult, CountArgs, CreateInput, CreateManyArgs, DeleteManyArgs,
    FindManyArgs, FindUniqueArgs, GroupByArgs, GroupByRow, Projection, UpdateArgs,
    UpdateManyArgs, UpsertArgs,
};
use crate::orm::engine::Engine;
use crate::orm::value::Record;

/// One delegate call against a model, named by its entity name.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub model: String,
    pub action: Action,
}

impl Operation {
    pub fn new(model: impl Into<String>, action: Action) -> Self {
        Self {
            model: model.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FindUnique(FindUniqueArgs),
    FindUniqueOrThrow(FindUniqueArgs),
    FindFirst(FindManyArgs),
    FindFirstOrThrow(FindManyArgs),
    FindMany(FindManyArgs),
    Create {
        data: CreateInput,
        projection: Projection,
    },
    CreateMany(CreateManyArgs),
    CreateManyAndReturn {
        args: CreateManyArgs,
        projection: Projection,
    },
    Update(UpdateArgs),
    UpdateMany(UpdateManyArgs),
    UpdateManyAndReturn {
        args: UpdateManyArgs,
        projection: Projection,
    },
    Upsert(UpsertArgs),
    Delete(FindUniqueArgs),
    DeleteMany(DeleteManyArgs),
    Count(CountArgs),
    Aggregate(AggregateArgs),
    GroupBy(GroupByArgs),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::FindUnique(_) => "findUnique",
            Action::FindUniqueOrThrow(_) => "findUniqueOrThrow",
            Action::FindFirst(_) => "findFirst",
            Action::FindFirstOrThrow(_) => "findFirstOrThrow",
            Action::FindMany(_) => "findMany",
            Action::Create { .. } => "create",
            Action::CreateMany(_) => "createMany",
            Action::CreateManyAndReturn { .. } => "createManyAndReturn",
            Action::Update(_) => "update",
            Action::UpdateMany(_) => "updateMany",
            Action::UpdateManyAndReturn { .. } => "updateManyAndReturn",
            Action::Upsert(_) => "upsert",
            Action::Delete(_) => "delete",
            Action::DeleteMany(_) => "deleteMany",
            Action::Count(_) => "count",
            Action::Aggregate(_) => "aggregate",
            Action::GroupBy(_) => "groupBy",
        }
    }
}

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    Record(Option<Record>),
    Records(Vec<Record>),
    Count(u64),
    Aggregate(AggregateResult),
    Groups(Vec<GroupByRow>),
}

impl OperationOutput {
    pub fn into_record(self) -> Option<Record> {
        match self {
            OperationOutput::Record(record) => record,
            _ => None,
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            OperationOutput::Records(records) => records,
            OperationOutput::Record(record) => record.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self {
            OperationOutput::Count(count) => Some(*count),
            _ => None,
        }
    }
}

impl Engine {
    /// Run one operation on `conn`.
    pub async fn execute(
        &self,
        conn: &mut SqliteConnection,
        operation: &Operation,
    ) -> Result<OperationOutput> {
        let model = self.model(&operation.model)?;
        tracing::debug!(
            model = model.name,
            action = operation.action.name(),
            "Executing operation"
        );

        let output = match &operation.action {
            Action::FindUnique(args) => {
                OperationOutput::Record(self.find_unique(conn, model, args).await?)
            }
            Action::FindUniqueOrThrow(args) => OperationOutput::Record(Some(
                self.find_unique(conn, model, args)
                    .await?
                    .ok_or_else(|| OrmError::not_found(model.name))?,
            )),
            Action::FindFirst(args) => {
                OperationOutput::Record(self.find_first(conn, model, args).await?)
            }
            Action::FindFirstOrThrow(args) => OperationOutput::Record(Some(
                self.find_first(conn, model, args)
                    .await?
                    .ok_or_else(|| OrmError::not_found(model.name))?,
            )),
            Action::FindMany(args) => {
                OperationOutput::Records(self.find_many(conn, model, args).await?)
            }
            Action::Create { data, projection } => {
                OperationOutput::Record(Some(self.create(conn, model, data, projection).await?))
            }
            Action::CreateMany(args) => {
                OperationOutput::Count(self.create_many(conn, model, args).await?)
            }
            Action::CreateManyAndReturn { args, projection } => OperationOutput::Records(
                self.create_many_and_return(conn, model, args, projection)
                    .await?,
            ),
            Action::Update(args) => {
                OperationOutput::Record(Some(self.update(conn, model, args).await?))
            }
            Action::UpdateMany(args) => {
                OperationOutput::Count(self.update_many(conn, model, args).await?)
            }
            Action::UpdateManyAndReturn { args, projection } => OperationOutput::Records(
                self.update_many_and_return(conn, model, args, projection)
                    .await?,
            ),
            Action::Upsert(args) => {
                OperationOutput::Record(Some(self.upsert(conn, model, args).await?))
            }
            Action::Delete(args) => {
                OperationOutput::Record(Some(self.delete(conn, model, args).await?))
            }
            Action::DeleteMany(args) => {
                OperationOutput::Count(self.delete_many(conn, model, args).await?)
            }
            Action::Count(args) => OperationOutput::Count(self.count(conn, model, args).await?),
            Action::Aggregate(args) => {
                OperationOutput::Aggregate(self.aggregate(conn, model, args).await?)
            }
            Action::GroupBy(args) => {
                OperationOutput::Groups(self.group_by(conn, model, args).await?)
            }
        };
        Ok(output)
    }
}
