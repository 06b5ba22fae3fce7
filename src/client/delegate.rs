//! Per-entity operations
//!
//! A `Delegate<M>` runs every operation against the model bound to `M`, on
//! whichever executor it was created from (the pool or an open transaction).
//! Typed methods deserialize full rows into `M`; the `*_record(s)` variants
//! return the dynamic `Record` and are the ones to use with `select`/`omit`.

use std::marker::PhantomData;

use tracing::debug;

use crate::db::Executor;
use crate::entities::Entity;
use crate::error::{OrmError, Result};
use crate::orm::{
    AggregateArgs, AggregateResult, CountArgs, CreateInput, CreateManyArgs, DeleteManyArgs,
    Engine, FindManyArgs, FindUniqueArgs, GroupByArgs, GroupByRow, IncludeArgs, Projection,
    Record, Related, UpdateArgs, UpdateManyArgs, UpsertArgs,
};
use crate::schema::ModelDef;

pub struct Delegate<M> {
    engine: Engine,
    executor: Executor,
    _entity: PhantomData<fn() -> M>,
}

impl<M> Clone for Delegate<M> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine,
            executor: self.executor.clone(),
            _entity: PhantomData,
        }
    }
}

fn entities<M: Entity>(records: Vec<Record>) -> Result<Vec<M>> {
    records.into_iter().map(Record::into_entity).collect()
}

impl<M: Entity> Delegate<M> {
    pub(crate) fn new(engine: Engine, executor: Executor) -> Self {
        Self {
            engine,
            executor,
            _entity: PhantomData,
        }
    }

    fn model(&self) -> Result<&'static ModelDef> {
        self.engine.model(M::MODEL)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn find_unique(&self, args: impl Into<FindUniqueArgs>) -> Result<Option<M>> {
        self.find_unique_record(args)
            .await?
            .map(Record::into_entity)
            .transpose()
    }

    pub async fn find_unique_record(
        &self,
        args: impl Into<FindUniqueArgs>,
    ) -> Result<Option<Record>> {
        let args = args.into();
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine
            .find_unique(guard.connection()?, model, &args)
            .await
    }

    /// Like `find_unique`, but a missing row is `NotFound`
    pub async fn find_unique_or_throw(&self, args: impl Into<FindUniqueArgs>) -> Result<M> {
        self.find_unique(args)
            .await?
            .ok_or_else(|| OrmError::not_found(M::MODEL))
    }

    pub async fn find_first(&self, args: impl Into<FindManyArgs>) -> Result<Option<M>> {
        self.find_first_record(args)
            .await?
            .map(Record::into_entity)
            .transpose()
    }

    pub async fn find_first_record(&self, args: impl Into<FindManyArgs>) -> Result<Option<Record>> {
        let args = args.into();
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine
            .find_first(guard.connection()?, model, &args)
            .await
    }

    pub async fn find_first_or_throw(&self, args: impl Into<FindManyArgs>) -> Result<M> {
        self.find_first(args)
            .await?
            .ok_or_else(|| OrmError::not_found(M::MODEL))
    }

    pub async fn find_many(&self, args: impl Into<FindManyArgs>) -> Result<Vec<M>> {
        entities(self.find_many_records(args).await?)
    }

    pub async fn find_many_records(&self, args: impl Into<FindManyArgs>) -> Result<Vec<Record>> {
        let args = args.into();
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine.find_many(guard.connection()?, model, &args).await
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub async fn create(&self, data: CreateInput) -> Result<M> {
        self.create_record(data, &Projection::default())
            .await?
            .into_entity()
    }

    pub async fn create_record(&self, data: CreateInput, projection: &Projection) -> Result<Record> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        let record = self
            .engine
            .create(guard.connection()?, model, &data, projection)
            .await?;
        debug!(model = model.name, "Created record");
        Ok(record)
    }

    /// Insert many rows; returns how many were written
    pub async fn create_many(&self, args: CreateManyArgs) -> Result<u64> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine
            .create_many(guard.connection()?, model, &args)
            .await
    }

    pub async fn create_many_and_return(&self, args: CreateManyArgs) -> Result<Vec<M>> {
        entities(
            self.create_many_and_return_records(args, &Projection::default())
                .await?,
        )
    }

    pub async fn create_many_and_return_records(
        &self,
        args: CreateManyArgs,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine
            .create_many_and_return(guard.connection()?, model, &args, projection)
            .await
    }

    pub async fn update(&self, args: UpdateArgs) -> Result<M> {
        self.update_record(args).await?.into_entity()
    }

    pub async fn update_record(&self, args: UpdateArgs) -> Result<Record> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine.update(guard.connection()?, model, &args).await
    }

    pub async fn update_many(&self, args: UpdateManyArgs) -> Result<u64> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine
            .update_many(guard.connection()?, model, &args)
            .await
    }

    pub async fn update_many_and_return(&self, args: UpdateManyArgs) -> Result<Vec<M>> {
        entities(
            self.update_many_and_return_records(args, &Projection::default())
                .await?,
        )
    }

    pub async fn update_many_and_return_records(
        &self,
        args: UpdateManyArgs,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine
            .update_many_and_return(guard.connection()?, model, &args, projection)
            .await
    }

    pub async fn upsert(&self, args: UpsertArgs) -> Result<M> {
        self.upsert_record(args).await?.into_entity()
    }

    pub async fn upsert_record(&self, args: UpsertArgs) -> Result<Record> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine.upsert(guard.connection()?, model, &args).await
    }

    /// Delete one row and return it as it was
    pub async fn delete(&self, args: impl Into<FindUniqueArgs>) -> Result<M> {
        self.delete_record(args).await?.into_entity()
    }

    pub async fn delete_record(&self, args: impl Into<FindUniqueArgs>) -> Result<Record> {
        let args = args.into();
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine.delete(guard.connection()?, model, &args).await
    }

    pub async fn delete_many(&self, args: DeleteManyArgs) -> Result<u64> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine
            .delete_many(guard.connection()?, model, &args)
            .await
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    pub async fn count(&self, args: impl Into<CountArgs>) -> Result<u64> {
        let args = args.into();
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine.count(guard.connection()?, model, &args).await
    }

    pub async fn aggregate(&self, args: AggregateArgs) -> Result<AggregateResult> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine.aggregate(guard.connection()?, model, &args).await
    }

    pub async fn group_by(&self, args: GroupByArgs) -> Result<Vec<GroupByRow>> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        self.engine.group_by(guard.connection()?, model, &args).await
    }

    // ========================================================================
    // Lazy relations
    // ========================================================================

    /// Load `relation` for a row fetched earlier.
    pub async fn load_relation(
        &self,
        record: &Record,
        relation: &str,
        args: IncludeArgs,
    ) -> Result<Related> {
        let model = self.model()?;
        let mut guard = self.executor.acquire().await?;
        crate::orm::relations::load_relation(
            guard.connection()?,
            self.engine.registry(),
            model,
            record,
            relation,
            args,
        )
        .await
    }

    /// Follow a to-one relation of `entity`; `None` when nothing is linked.
    pub async fn related_one<R: Entity>(&self, entity: &M, relation: &str) -> Result<Option<R>> {
        let record = Record::from_entity(self.model()?, entity)?;
        match self
            .load_relation(&record, relation, IncludeArgs::new())
            .await?
        {
            Related::One(one) => one.map(|r| (*r).into_entity()).transpose(),
            Related::Many(_) => Err(OrmError::invalid(format!(
                "`{}.{}` is a list relation",
                M::MODEL,
                relation
            ))),
        }
    }

    /// Follow a list relation of `entity`, filtered and paginated by `args`.
    pub async fn related_many<R: Entity>(
        &self,
        entity: &M,
        relation: &str,
        args: IncludeArgs,
    ) -> Result<Vec<R>> {
        let record = Record::from_entity(self.model()?, entity)?;
        match self.load_relation(&record, relation, args).await? {
            Related::Many(records) => entities(records),
            Related::One(_) => Err(OrmError::invalid(format!(
                "`{}.{}` is not a list relation",
                M::MODEL,
                relation
            ))),
        }
    }
}
