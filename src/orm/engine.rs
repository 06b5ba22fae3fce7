//! Query engine: executes reads and writes for any registered model.
//!
//! Every public method takes the connection it runs on, so the same code
//! serves pooled calls and transactions. Multi-statement writes open a
//! transaction on that connection, which SQLite turns into a savepoint when
//! one is already active.

use std::collections::{BTreeMap, HashMap};

use futures::future::BoxFuture;
use sqlx::{Connection, SqliteConnection};

use crate::db::sqlite_helpers::{new_id, now};
use crate::error::{OrmError, Result};
use crate::orm::args::{
    CountArgs, CreateInput, CreateManyArgs, DeleteManyArgs, FieldUpdate, FindManyArgs,
    FindUniqueArgs, Projection, RelationWrite, UpdateArgs, UpdateInput, UpdateManyArgs,
    UpsertArgs,
};
use crate::orm::builder::{
    QueryCompiler, ROOT, SelectPlan, apply_projection, execute_with_binds, fetch_rows, quote,
    select_columns, table_ref, validate_projection,
};
use crate::orm::filters::{WhereInput, WhereUniqueInput};
use crate::orm::relations;
use crate::orm::value::{Record, SqlValue, Value, decode_field, decode_model_row};
use crate::schema::shapes::CreateRequirement;
use crate::schema::{DefaultValue, FieldDef, FieldType, ModelDef, RelationDef, SchemaRegistry};

/// Upper bound on bound parameters per `IN (..)` statement.
const ID_CHUNK: usize = 500;

/// Executes operations against the schema in `registry`.
#[derive(Debug, Clone, Copy)]
pub struct Engine {
    registry: &'static SchemaRegistry,
}

impl Engine {
    pub fn new(registry: &'static SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'static SchemaRegistry {
        self.registry
    }

    pub fn model(&self, name: &str) -> Result<&'static ModelDef> {
        self.registry.get_entity(name)
    }

    // ========================================================================
    // Statement helpers
    // ========================================================================

    pub(crate) async fn fetch_records(
        &self,
        conn: &mut SqliteConnection,
        model: &ModelDef,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<Vec<Record>> {
        let rows = fetch_rows(conn, sql, values)
            .await
            .map_err(|e| OrmError::from_sqlx(e, self.registry, model.name))?;
        rows.iter()
            .map(|row| decode_model_row(model, row, 0))
            .collect()
    }

    async fn exec(
        &self,
        conn: &mut SqliteConnection,
        model: &ModelDef,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<u64> {
        let result = execute_with_binds(conn, sql, values)
            .await
            .map_err(|e| OrmError::from_sqlx(e, self.registry, model.name))?;
        Ok(result.rows_affected())
    }

    /// Resolve includes and apply select/omit to fetched rows.
    pub(crate) async fn finalize(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        mut records: Vec<Record>,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        if !projection.include.is_empty() && !records.is_empty() {
            relations::resolve_includes(
                conn,
                self.registry,
                model,
                &mut records,
                &projection.include,
            )
            .await?;
        }
        for record in &mut records {
            apply_projection(record, projection);
        }
        Ok(records)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Row matching a unique selector, without includes or projection.
    pub(crate) async fn find_unique_row(
        &self,
        conn: &mut SqliteConnection,
        model: &ModelDef,
        unique: &WhereUniqueInput,
    ) -> Result<Option<Record>> {
        let fragment = QueryCompiler::new(self.registry).compile_unique(model, ROOT, unique)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} LIMIT 1",
            select_columns(model, ROOT),
            table_ref(model, ROOT),
            fragment.sql
        );
        let mut records = self.fetch_records(conn, model, &sql, &fragment.values).await?;
        Ok(records.pop())
    }

    pub(crate) async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        model: &ModelDef,
        id: &Value,
    ) -> Result<Option<Record>> {
        let unique = WhereUniqueInput::new(model.id_field().name, id.clone());
        self.find_unique_row(conn, model, &unique).await
    }

    /// Rows for `ids`, returned in the order of `ids`.
    pub(crate) async fn fetch_by_ids(
        &self,
        conn: &mut SqliteConnection,
        model: &ModelDef,
        ids: &[Value],
    ) -> Result<Vec<Record>> {
        let id_field = model.id_field();
        let mut by_key: HashMap<String, Record> = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT {} FROM {} WHERE {}.{} IN ({})",
                select_columns(model, ROOT),
                table_ref(model, ROOT),
                quote(ROOT),
                quote(id_field.column),
                vec!["?"; chunk.len()].join(", ")
            );
            let values: Vec<SqlValue> = chunk.iter().map(Value::to_sql).collect();
            for record in self.fetch_records(conn, model, &sql, &values).await? {
                if let Some(key) = record.get(id_field.name).and_then(Value::group_key) {
                    by_key.insert(key, record);
                }
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| id.group_key().and_then(|k| by_key.remove(&k)))
            .collect())
    }

    /// Validate the arguments and resolve the cursor. `None` when the cursor
    /// matches no row.
    pub(crate) async fn plan(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &FindManyArgs,
    ) -> Result<Option<SelectPlan<'static>>> {
        let plan = QueryCompiler::new(self.registry).plan(model, args, None)?;
        let Some(cursor) = &args.cursor else {
            return Ok(Some(plan));
        };
        let Some(row) = self.find_unique_row(conn, model, cursor).await? else {
            return Ok(None);
        };
        Ok(Some(
            QueryCompiler::new(self.registry).plan(model, args, Some(&row))?,
        ))
    }

    pub async fn find_unique(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &FindUniqueArgs,
    ) -> Result<Option<Record>> {
        validate_projection(self.registry, model, &args.projection)?;
        let Some(row) = self.find_unique_row(conn, model, &args.filter).await? else {
            return Ok(None);
        };
        let mut records = self
            .finalize(conn, model, vec![row], &args.projection)
            .await?;
        Ok(records.pop())
    }

    pub async fn find_many(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &FindManyArgs,
    ) -> Result<Vec<Record>> {
        validate_projection(self.registry, model, &args.projection)?;
        let Some(plan) = self.plan(conn, model, args).await? else {
            return Ok(Vec::new());
        };
        let records = self
            .fetch_records(conn, model, &plan.select_sql(), &plan.values)
            .await?;
        let records = plan.finish(records);
        self.finalize(conn, model, records, &args.projection).await
    }

    pub async fn find_first(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &FindManyArgs,
    ) -> Result<Option<Record>> {
        let mut args = args.clone();
        args.take = Some(match args.take {
            Some(take) if take < 0 => -1,
            _ => 1,
        });
        Ok(self.find_many(conn, model, &args).await?.into_iter().next())
    }

    /// Primary keys of rows matching `filter`, at most `limit` of them.
    async fn select_ids(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        filter: Option<&WhereInput>,
        limit: Option<i64>,
    ) -> Result<Vec<Value>> {
        if let Some(limit) = limit.filter(|l| *l < 0) {
            return Err(OrmError::invalid(format!(
                "limit must not be negative, got {limit}"
            )));
        }
        let args = FindManyArgs {
            filter: filter.cloned(),
            take: limit,
            ..Default::default()
        };
        let plan = QueryCompiler::new(self.registry).plan(model, &args, None)?;
        let rows = fetch_rows(conn, &plan.id_sql(), &plan.values)
            .await
            .map_err(|e| OrmError::from_sqlx(e, self.registry, model.name))?;
        let id_field = model.id_field();
        rows.iter()
            .map(|row| decode_field(model, id_field, row, 0))
            .collect()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn validate_create(&self, model: &ModelDef, data: &CreateInput) -> Result<()> {
        let shapes = self.registry.shapes(model.name)?;

        for name in data.scalars.keys() {
            if shapes.create_field(name).is_none() {
                return Err(OrmError::unknown_field(model.name, name));
            }
        }

        for (name, write) in &data.relations {
            let relation = model.relation_or_err(name)?;
            let allowed = shapes
                .relation_write(name)
                .is_some_and(|shape| shape.allows(write.kind(), true));
            if !allowed {
                return Err(OrmError::invalid(format!(
                    "{:?} is not supported on `{}.{}` when creating",
                    write.kind(),
                    model.name,
                    name
                )));
            }
            if relation.is_owning() && data.scalars.contains_key(relation.local_field) {
                return Err(OrmError::invalid(format!(
                    "`{}.{}` and relation `{}` are mutually exclusive",
                    model.name, relation.local_field, name
                )));
            }
        }

        for required in shapes.required_on_create() {
            let satisfied = data.scalars.contains_key(required.field)
                || matches!(
                    required.requirement,
                    CreateRequirement::ForeignKey { relation, .. } if data.relations.contains_key(relation)
                );
            if !satisfied {
                return Err(OrmError::MissingRequiredField {
                    model: model.name.to_string(),
                    field: required.field.to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_update(&self, model: &ModelDef, data: &UpdateInput) -> Result<()> {
        let shapes = self.registry.shapes(model.name)?;

        for (name, update) in &data.fields {
            let shape = shapes
                .update_field(name)
                .ok_or_else(|| OrmError::unknown_field(model.name, name))?;
            if shape.immutable {
                return Err(OrmError::invalid(format!(
                    "`{}.{}` is immutable",
                    model.name, name
                )));
            }
            match update {
                FieldUpdate::Set(_) => {}
                FieldUpdate::Divide(by) if *by == 0.0 => {
                    return Err(OrmError::invalid(format!(
                        "division by zero on `{}.{}`",
                        model.name, name
                    )));
                }
                _ if !shape.numeric_operations => {
                    return Err(OrmError::invalid(format!(
                        "`{}.{}` is {} and takes no arithmetic updates",
                        model.name, name, shape.field_type
                    )));
                }
                _ => {}
            }
            let via_relation = model
                .relation_for_foreign_key(name)
                .filter(|r| data.relations.contains_key(r.name));
            if let Some(relation) = via_relation {
                return Err(OrmError::invalid(format!(
                    "`{}.{}` and relation `{}` are mutually exclusive",
                    model.name, name, relation.name
                )));
            }
        }

        for (name, write) in &data.relations {
            model.relation_or_err(name)?;
            let allowed = shapes
                .relation_write(name)
                .is_some_and(|shape| shape.allows(write.kind(), false));
            if !allowed {
                return Err(OrmError::invalid(format!(
                    "{:?} is not supported on `{}.{}` when updating",
                    write.kind(),
                    model.name,
                    name
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        data: &CreateInput,
        projection: &Projection,
    ) -> Result<Record> {
        validate_projection(self.registry, model, projection)?;

        let mut tx = conn.begin().await?;
        let id = self.insert(&mut tx, model, data).await?;
        let record = self
            .find_by_id(&mut tx, model, &id)
            .await?
            .ok_or_else(|| OrmError::not_found(model.name))?;
        let mut records = self
            .finalize(&mut tx, model, vec![record], projection)
            .await?;
        tx.commit().await?;
        records.pop().ok_or_else(|| OrmError::not_found(model.name))
    }

    /// Insert one row with its nested writes; returns the new primary key.
    fn insert<'a>(
        &'a self,
        conn: &'a mut SqliteConnection,
        model: &'static ModelDef,
        data: &'a CreateInput,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            self.validate_create(model, data)?;
            let mut values = self.coerce_scalars(model, data)?;

            for (name, write) in &data.relations {
                let relation = model.relation_or_err(name)?;
                if relation.is_owning() {
                    let key = self.resolve_owning_write(conn, relation, write).await?;
                    values.insert(relation.local_field, key);
                }
            }

            self.fill_defaults(model, &mut values)?;
            let id = values
                .get(model.id_field().name)
                .cloned()
                .unwrap_or_default();

            for relation in model.relations.iter().filter(|r| r.scope.is_some()) {
                if let Some(parent) = values.get(relation.local_field) {
                    let scope = relation.scope.and_then(|s| values.get(s));
                    self.check_parent(conn, model, relation, Some(&id), scope, parent)
                        .await?;
                }
            }

            self.insert_row(conn, model, &values, false).await?;

            for (name, write) in &data.relations {
                let relation = model.relation_or_err(name)?;
                if !relation.is_owning() {
                    let key = values
                        .get(relation.local_field)
                        .cloned()
                        .unwrap_or_default();
                    self.write_inverse(conn, relation, &key, write).await?;
                }
            }
            Ok(id)
        })
    }

    fn coerce_scalars(
        &self,
        model: &ModelDef,
        data: &CreateInput,
    ) -> Result<BTreeMap<&'static str, Value>> {
        let mut values = BTreeMap::new();
        for (name, value) in &data.scalars {
            let field = model.field_or_err(name)?;
            values.insert(field.name, value.clone().coerce(model, field)?);
        }
        Ok(values)
    }

    fn fill_defaults(
        &self,
        model: &ModelDef,
        values: &mut BTreeMap<&'static str, Value>,
    ) -> Result<()> {
        let stamp = now();
        for field in &model.fields {
            if values.contains_key(field.name) {
                continue;
            }
            let value = match field.default {
                Some(DefaultValue::Uuid) => Value::String(new_id()),
                Some(DefaultValue::Now) => Value::DateTime(stamp),
                Some(DefaultValue::Bool(b)) => Value::Bool(b),
                Some(DefaultValue::Int(i)) => Value::Int(i),
                Some(DefaultValue::Float(f)) => Value::Float(f),
                None if field.nullable => Value::Null,
                None => {
                    return Err(OrmError::MissingRequiredField {
                        model: model.name.to_string(),
                        field: field.name.to_string(),
                    });
                }
            };
            values.insert(field.name, value);
        }
        Ok(())
    }

    async fn insert_row(
        &self,
        conn: &mut SqliteConnection,
        model: &ModelDef,
        values: &BTreeMap<&'static str, Value>,
        skip_duplicates: bool,
    ) -> Result<u64> {
        let mut columns = Vec::with_capacity(values.len());
        let mut binds = Vec::with_capacity(values.len());
        for (name, value) in values {
            columns.push(quote(model.field_or_err(name)?.column));
            binds.push(value.to_sql());
        }
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(model.table),
            columns.join(", "),
            vec!["?"; binds.len()].join(", ")
        );
        if skip_duplicates {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }
        self.exec(conn, model, &sql, &binds).await
    }

    /// Foreign key value for a connect/create on an owning relation.
    async fn resolve_owning_write(
        &self,
        conn: &mut SqliteConnection,
        relation: &RelationDef,
        write: &RelationWrite,
    ) -> Result<Value> {
        let target = self.model(relation.target)?;
        let row = match write {
            RelationWrite::Connect(unique) => self.find_unique_row(conn, target, unique).await?,
            RelationWrite::Create(data) => {
                let id = self.insert(conn, target, data).await?;
                self.find_by_id(conn, target, &id).await?
            }
            RelationWrite::Disconnect => return Ok(Value::Null),
            RelationWrite::ConnectMany(_) | RelationWrite::CreateMany(_) => {
                return Err(OrmError::invalid(format!(
                    "`{}` is a to-one relation",
                    relation.name
                )));
            }
        };
        let row = row.ok_or_else(|| OrmError::not_found(target.name))?;
        Ok(row.get(relation.target_field).cloned().unwrap_or_default())
    }

    /// Apply a nested write on a relation whose foreign key lives on the target.
    async fn write_inverse(
        &self,
        conn: &mut SqliteConnection,
        relation: &RelationDef,
        key: &Value,
        write: &RelationWrite,
    ) -> Result<()> {
        let target = self.model(relation.target)?;
        let fk = target.field_or_err(relation.target_field)?;

        match write {
            RelationWrite::Create(data) => {
                self.create_child(conn, target, fk, key, data).await?;
            }
            RelationWrite::CreateMany(items) => {
                for data in items {
                    self.create_child(conn, target, fk, key, data).await?;
                }
            }
            RelationWrite::Connect(unique) => {
                self.connect_child(conn, target, fk, key, unique).await?;
            }
            RelationWrite::ConnectMany(uniques) => {
                for unique in uniques {
                    self.connect_child(conn, target, fk, key, unique).await?;
                }
            }
            RelationWrite::Disconnect => {
                if !fk.nullable {
                    return Err(OrmError::invalid(format!(
                        "`{}.{}` is required, the relation cannot be disconnected",
                        target.name, fk.name
                    )));
                }
                let sql = format!(
                    "UPDATE {} SET {col} = NULL WHERE {col} = ?",
                    quote(target.table),
                    col = quote(fk.column)
                );
                self.exec(conn, target, &sql, &[key.to_sql()]).await?;
            }
        }
        Ok(())
    }

    async fn create_child(
        &self,
        conn: &mut SqliteConnection,
        target: &'static ModelDef,
        fk: &FieldDef,
        key: &Value,
        data: &CreateInput,
    ) -> Result<()> {
        let mut child = data.clone();
        child.scalars.insert(fk.name.to_string(), key.clone());
        self.insert(conn, target, &child).await?;
        Ok(())
    }

    async fn connect_child(
        &self,
        conn: &mut SqliteConnection,
        target: &'static ModelDef,
        fk: &FieldDef,
        key: &Value,
        unique: &WhereUniqueInput,
    ) -> Result<()> {
        let child = self
            .find_unique_row(conn, target, unique)
            .await?
            .ok_or_else(|| OrmError::not_found(target.name))?;
        let child_id = child.get(target.id_field().name).cloned().unwrap_or_default();

        let scoped = target
            .relation_for_foreign_key(fk.name)
            .filter(|r| r.scope.is_some());
        if let Some(relation) = scoped {
            let scope = relation.scope.and_then(|s| child.get(s));
            self.check_parent(conn, target, relation, Some(&child_id), scope, key)
                .await?;
        }

        let sql = format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            quote(target.table),
            quote(fk.column),
            quote(target.id_field().column)
        );
        self.exec(conn, target, &sql, &[key.to_sql(), child_id.to_sql()])
            .await?;
        Ok(())
    }

    /// Re-check scoped self-relations for a row about to be updated. A new
    /// parent, or the current parent under a new scope, must pass
    /// `check_parent`; a row with children cannot leave its scope.
    async fn check_scoped_update(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        id: &Value,
        existing: &Record,
        assigned: &BTreeMap<&'static str, Value>,
    ) -> Result<()> {
        for relation in model.relations.iter() {
            let Some(scope_field) = relation.scope else {
                continue;
            };
            let new_scope = assigned
                .get(scope_field)
                .filter(|scope| existing.get(scope_field) != Some(*scope));
            let parent = match assigned.get(relation.local_field) {
                Some(parent) => Some(parent),
                None if new_scope.is_some() => existing.get(relation.local_field),
                None => None,
            };
            let scope = new_scope.or_else(|| existing.get(scope_field));
            if let Some(parent) = parent {
                self.check_parent(conn, model, relation, Some(id), scope, parent)
                    .await?;
            }

            if new_scope.is_some() && relation.target == model.name {
                let children = CountArgs::new()
                    .filter(WhereInput::equals(relation.local_field, id.clone()));
                if self.count(conn, model, &children).await? > 0 {
                    return Err(OrmError::invalid(format!(
                        "`{}.{}` cannot change while rows still reference it through `{}`",
                        model.name, scope_field, relation.local_field
                    )));
                }
            }
        }
        Ok(())
    }

    /// For scoped self-relations: the parent must share the scope field and
    /// must not be the row itself or one of its descendants.
    async fn check_parent(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        relation: &RelationDef,
        child_id: Option<&Value>,
        child_scope: Option<&Value>,
        parent: &Value,
    ) -> Result<()> {
        if parent.is_null() || relation.target != model.name {
            return Ok(());
        }

        let mut current = parent.clone();
        let mut first = true;
        loop {
            if child_id == Some(&current) {
                return Err(OrmError::invalid(format!(
                    "`{}.{}` would make the row its own ancestor",
                    model.name, relation.local_field
                )));
            }
            // a missing parent is left to the foreign key constraint
            let Some(row) = self.find_by_id(conn, model, &current).await? else {
                return Ok(());
            };
            if first {
                if let (Some(scope), Some(expected)) = (relation.scope, child_scope) {
                    if row.get(scope) != Some(expected) {
                        return Err(OrmError::invalid(format!(
                            "`{}.{}` must reference a row with the same `{}`",
                            model.name, relation.local_field, scope
                        )));
                    }
                }
                first = false;
            }
            match row.get(relation.local_field) {
                Some(next) if !next.is_null() => current = next.clone(),
                _ => return Ok(()),
            }
        }
    }

    /// SET clause for scalar updates (plus the updated-at stamp), and the
    /// literal values being assigned.
    fn assignments(
        &self,
        model: &ModelDef,
        data: &UpdateInput,
    ) -> Result<(Vec<String>, Vec<SqlValue>, BTreeMap<&'static str, Value>)> {
        let mut sets = Vec::new();
        let mut binds = Vec::new();
        let mut assigned = BTreeMap::new();

        for (name, update) in &data.fields {
            let field = model.field_or_err(name)?;
            let col = quote(field.column);
            let (expr, value) = match update {
                FieldUpdate::Set(value) => {
                    let value = value.clone().coerce(model, field)?;
                    assigned.insert(field.name, value.clone());
                    (format!("{col} = ?"), value.to_sql())
                }
                FieldUpdate::Increment(by) => (format!("{col} = {col} + ?"), numeric(model, field, *by)?),
                FieldUpdate::Decrement(by) => (format!("{col} = {col} - ?"), numeric(model, field, *by)?),
                FieldUpdate::Multiply(by) => (format!("{col} = {col} * ?"), numeric(model, field, *by)?),
                FieldUpdate::Divide(by) => (format!("{col} = {col} / ?"), numeric(model, field, *by)?),
            };
            sets.push(expr);
            binds.push(value);
        }

        if !data.is_empty() {
            let stamp = Value::DateTime(now());
            for field in model.fields.iter().filter(|f| f.updated_at) {
                if !data.fields.contains_key(field.name) {
                    sets.push(format!("{} = ?", quote(field.column)));
                    binds.push(stamp.to_sql());
                }
            }
        }
        Ok((sets, binds, assigned))
    }

    /// Apply an update to one existing row.
    async fn apply_update(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        existing: &Record,
        data: &UpdateInput,
    ) -> Result<()> {
        let id_field = model.id_field();
        let id = existing.get(id_field.name).cloned().unwrap_or_default();
        let (mut sets, mut binds, mut assigned) = self.assignments(model, data)?;

        for (name, write) in &data.relations {
            let relation = model.relation_or_err(name)?;
            if relation.is_owning() {
                let key = self.resolve_owning_write(conn, relation, write).await?;
                let fk = model.field_or_err(relation.local_field)?;
                sets.push(format!("{} = ?", quote(fk.column)));
                binds.push(key.to_sql());
                assigned.insert(fk.name, key);
            }
        }

        self.check_scoped_update(conn, model, &id, existing, &assigned)
            .await?;

        if !sets.is_empty() {
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                quote(model.table),
                sets.join(", "),
                quote(id_field.column)
            );
            binds.push(id.to_sql());
            self.exec(conn, model, &sql, &binds).await?;
        }

        for (name, write) in &data.relations {
            let relation = model.relation_or_err(name)?;
            if !relation.is_owning() {
                let key = existing
                    .get(relation.local_field)
                    .cloned()
                    .unwrap_or_default();
                self.write_inverse(conn, relation, &key, write).await?;
            }
        }
        Ok(())
    }

    pub async fn update(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &UpdateArgs,
    ) -> Result<Record> {
        validate_projection(self.registry, model, &args.projection)?;
        self.validate_update(model, &args.data)?;

        let mut tx = conn.begin().await?;
        let existing = self
            .find_unique_row(&mut tx, model, &args.filter)
            .await?
            .ok_or_else(|| OrmError::not_found(model.name))?;
        self.apply_update(&mut tx, model, &existing, &args.data)
            .await?;

        let id = existing
            .get(model.id_field().name)
            .cloned()
            .unwrap_or_default();
        let record = self
            .find_by_id(&mut tx, model, &id)
            .await?
            .ok_or_else(|| OrmError::not_found(model.name))?;
        let mut records = self
            .finalize(&mut tx, model, vec![record], &args.projection)
            .await?;
        tx.commit().await?;
        records.pop().ok_or_else(|| OrmError::not_found(model.name))
    }

    /// Update every matching row; returns the affected primary keys.
    async fn update_matching(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &UpdateManyArgs,
    ) -> Result<Vec<Value>> {
        self.validate_update(model, &args.data)?;
        if !args.data.relations.is_empty() {
            return Err(OrmError::invalid(
                "updateMany takes scalar fields only, not relation writes",
            ));
        }
        let (sets, binds, assigned) = self.assignments(model, &args.data)?;
        let ids = self
            .select_ids(conn, model, args.filter.as_ref(), args.limit)
            .await?;
        if ids.is_empty() || sets.is_empty() {
            return Ok(ids);
        }

        let touches_tree = model.relations.iter().any(|r| {
            r.scope.is_some_and(|scope| {
                assigned.contains_key(r.local_field) || assigned.contains_key(scope)
            })
        });
        if touches_tree {
            for id in &ids {
                if let Some(existing) = self.find_by_id(conn, model, id).await? {
                    self.check_scoped_update(conn, model, id, &existing, &assigned)
                        .await?;
                }
            }
        }

        let id_col = quote(model.id_field().column);
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "UPDATE {} SET {} WHERE {} IN ({})",
                quote(model.table),
                sets.join(", "),
                id_col,
                vec!["?"; chunk.len()].join(", ")
            );
            let mut values = binds.clone();
            values.extend(chunk.iter().map(Value::to_sql));
            self.exec(conn, model, &sql, &values).await?;
        }
        Ok(ids)
    }

    pub async fn update_many(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &UpdateManyArgs,
    ) -> Result<u64> {
        let mut tx = conn.begin().await?;
        let ids = self.update_matching(&mut tx, model, args).await?;
        tx.commit().await?;
        Ok(ids.len() as u64)
    }

    pub async fn update_many_and_return(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &UpdateManyArgs,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        validate_projection(self.registry, model, projection)?;
        let mut tx = conn.begin().await?;
        let ids = self.update_matching(&mut tx, model, args).await?;
        let records = self.fetch_by_ids(&mut tx, model, &ids).await?;
        let records = self.finalize(&mut tx, model, records, projection).await?;
        tx.commit().await?;
        Ok(records)
    }

    pub async fn upsert(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &UpsertArgs,
    ) -> Result<Record> {
        validate_projection(self.registry, model, &args.projection)?;
        self.validate_update(model, &args.update)?;
        self.validate_create(model, &args.create)?;

        let mut tx = conn.begin().await?;
        let id = match self.find_unique_row(&mut tx, model, &args.filter).await? {
            Some(existing) => {
                self.apply_update(&mut tx, model, &existing, &args.update)
                    .await?;
                existing
                    .get(model.id_field().name)
                    .cloned()
                    .unwrap_or_default()
            }
            None => self.insert(&mut tx, model, &args.create).await?,
        };
        let record = self
            .find_by_id(&mut tx, model, &id)
            .await?
            .ok_or_else(|| OrmError::not_found(model.name))?;
        let mut records = self
            .finalize(&mut tx, model, vec![record], &args.projection)
            .await?;
        tx.commit().await?;
        records.pop().ok_or_else(|| OrmError::not_found(model.name))
    }

    /// Insert rows; returns the primary keys actually inserted.
    async fn insert_many(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &CreateManyArgs,
    ) -> Result<Vec<Value>> {
        for data in &args.data {
            if !data.relations.is_empty() {
                return Err(OrmError::invalid(
                    "createMany takes scalar fields only, not relation writes",
                ));
            }
            self.validate_create(model, data)?;
        }

        let mut inserted = Vec::with_capacity(args.data.len());
        for data in &args.data {
            let mut values = self.coerce_scalars(model, data)?;
            self.fill_defaults(model, &mut values)?;
            for relation in model.relations.iter().filter(|r| r.scope.is_some()) {
                if let Some(parent) = values.get(relation.local_field) {
                    let id = values.get(model.id_field().name);
                    let scope = relation.scope.and_then(|s| values.get(s));
                    self.check_parent(conn, model, relation, id, scope, parent)
                        .await?;
                }
            }
            let affected = self
                .insert_row(conn, model, &values, args.skip_duplicates)
                .await?;
            if affected > 0 {
                inserted.push(
                    values
                        .get(model.id_field().name)
                        .cloned()
                        .unwrap_or_default(),
                );
            }
        }
        Ok(inserted)
    }

    pub async fn create_many(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &CreateManyArgs,
    ) -> Result<u64> {
        let mut tx = conn.begin().await?;
        let ids = self.insert_many(&mut tx, model, args).await?;
        tx.commit().await?;
        Ok(ids.len() as u64)
    }

    pub async fn create_many_and_return(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &CreateManyArgs,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        validate_projection(self.registry, model, projection)?;
        let mut tx = conn.begin().await?;
        let ids = self.insert_many(&mut tx, model, args).await?;
        let records = self.fetch_by_ids(&mut tx, model, &ids).await?;
        let records = self.finalize(&mut tx, model, records, projection).await?;
        tx.commit().await?;
        Ok(records)
    }

    /// Delete one row, returning it as it was (includes resolved first).
    pub async fn delete(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &FindUniqueArgs,
    ) -> Result<Record> {
        validate_projection(self.registry, model, &args.projection)?;

        let mut tx = conn.begin().await?;
        let existing = self
            .find_unique_row(&mut tx, model, &args.filter)
            .await?
            .ok_or_else(|| OrmError::not_found(model.name))?;
        let id = existing
            .get(model.id_field().name)
            .cloned()
            .unwrap_or_default();
        let mut records = self
            .finalize(&mut tx, model, vec![existing], &args.projection)
            .await?;

        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote(model.table),
            quote(model.id_field().column)
        );
        self.exec(&mut tx, model, &sql, &[id.to_sql()]).await?;
        tx.commit().await?;
        records.pop().ok_or_else(|| OrmError::not_found(model.name))
    }

    pub async fn delete_many(
        &self,
        conn: &mut SqliteConnection,
        model: &'static ModelDef,
        args: &DeleteManyArgs,
    ) -> Result<u64> {
        let mut tx = conn.begin().await?;
        let ids = self
            .select_ids(&mut tx, model, args.filter.as_ref(), args.limit)
            .await?;
        let mut deleted = 0;
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "DELETE FROM {} WHERE {} IN ({})",
                quote(model.table),
                quote(model.id_field().column),
                vec!["?"; chunk.len()].join(", ")
            );
            let values: Vec<SqlValue> = chunk.iter().map(Value::to_sql).collect();
            deleted += self.exec(&mut tx, model, &sql, &values).await?;
        }
        tx.commit().await?;
        Ok(deleted)
    }
}

/// Bind value for an arithmetic update on a numeric field.
fn numeric(model: &ModelDef, field: &FieldDef, by: f64) -> Result<SqlValue> {
    match field.field_type {
        FieldType::Float => Ok(SqlValue::Float(by)),
        FieldType::Int if by.fract() == 0.0 => Ok(SqlValue::Int(by as i64)),
        _ => Err(OrmError::InvalidValue {
            model: model.name.to_string(),
            field: field.name.to_string(),
            expected: field.field_type.to_string(),
        }),
    }
}
