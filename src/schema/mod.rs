//! Schema registry
//!
//! Holds every entity definition (fields, relations, unique keys) and is the
//! single source of truth for shapes, SQL generation and validation. The
//! registry is built once per process and never mutated afterwards.

mod definition;
pub mod shapes;

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::error::{OrmError, Result};

pub use shapes::InputShapes;

static REGISTRY: Lazy<SchemaRegistry> = Lazy::new(|| SchemaRegistry::new(definition::models()));

// ============================================================================
// Fields
// ============================================================================

/// Semantic type of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Boolean,
    Int,
    Float,
    DateTime,
}

impl FieldType {
    /// SQLite storage class used for the column.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::DateTime => "TEXT",
            FieldType::Boolean | FieldType::Int => "INTEGER",
            FieldType::Float => "REAL",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Boolean => "Boolean",
            FieldType::Int => "Int",
            FieldType::Float => "Float",
            FieldType::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value generated for a field the caller did not supply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Uuid,
    Now,
    Bool(bool),
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// API name (camelCase)
    pub name: &'static str,
    /// Column name (snake_case)
    pub column: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
    pub is_id: bool,
    pub is_unique: bool,
    pub default: Option<DefaultValue>,
    /// Stamped with the current time on every write
    pub updated_at: bool,
}

impl FieldDef {
    pub fn new(name: &'static str, column: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            column,
            field_type,
            nullable: false,
            is_id: false,
            is_unique: false,
            default: None,
            updated_at: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn id(mut self) -> Self {
        self.is_id = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn stamped(mut self) -> Self {
        self.updated_at = true;
        self
    }

    /// Column definition for CREATE TABLE / ALTER TABLE ADD COLUMN
    pub fn column_sql(&self) -> String {
        let mut sql = format!("\"{}\" {}", self.column, self.field_type.sql_type());
        if self.is_id {
            sql.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        match self.default {
            Some(DefaultValue::Bool(b)) => sql.push_str(if b { " DEFAULT 1" } else { " DEFAULT 0" }),
            Some(DefaultValue::Int(i)) => sql.push_str(&format!(" DEFAULT {i}")),
            Some(DefaultValue::Float(f)) => sql.push_str(&format!(" DEFAULT {f:?}")),
            _ => {}
        }
        sql
    }
}

// ============================================================================
// Relations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Foreign key lives on this model, points at one parent
    ManyToOne,
    /// Children hold the foreign key
    OneToMany,
    /// One-to-one, foreign key (unique) lives on this model
    OneToOneOwner,
    /// One-to-one, foreign key lives on the target
    OneToOneInverse,
}

/// Action taken on children when the referenced row is deleted or updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
    NoAction,
}

impl ReferentialAction {
    pub fn to_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    pub name: &'static str,
    pub target: &'static str,
    pub kind: RelationKind,
    /// Field on this model taking part in the join
    pub local_field: &'static str,
    /// Field on the target model taking part in the join
    pub target_field: &'static str,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
    /// For self-relations: the field a parent and its child must share
    pub scope: Option<&'static str>,
}

impl RelationDef {
    pub fn is_list(&self) -> bool {
        self.kind == RelationKind::OneToMany
    }

    /// Whether the foreign key column lives on this model.
    pub fn is_owning(&self) -> bool {
        matches!(self.kind, RelationKind::ManyToOne | RelationKind::OneToOneOwner)
    }
}

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: &'static str,
    pub table: &'static str,
    pub fields: Vec<FieldDef>,
    pub relations: Vec<RelationDef>,
}

impl ModelDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_or_err(&self, name: &str) -> Result<&FieldDef> {
        self.field(name)
            .ok_or_else(|| OrmError::unknown_field(self.name, name))
    }

    pub fn field_by_column(&self, column: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn relation_or_err(&self, name: &str) -> Result<&RelationDef> {
        self.relation(name).ok_or_else(|| OrmError::UnknownRelation {
            model: self.name.to_string(),
            relation: name.to_string(),
        })
    }

    /// Owning relation whose foreign key is `field`, if any.
    pub fn relation_for_foreign_key(&self, field: &str) -> Option<&RelationDef> {
        self.relations
            .iter()
            .find(|r| r.is_owning() && r.local_field == field)
    }

    pub fn id_field(&self) -> &FieldDef {
        // every model declares an id; checked by `SchemaRegistry::validate`
        self.fields
            .iter()
            .find(|f| f.is_id)
            .unwrap_or(&self.fields[0])
    }

    /// Single-field unique keys: the primary key followed by unique fields.
    pub fn unique_keys(&self) -> Vec<&'static str> {
        let mut keys = vec![self.id_field().name];
        keys.extend(
            self.fields
                .iter()
                .filter(|f| f.is_unique && !f.is_id)
                .map(|f| f.name),
        );
        keys
    }

    pub fn is_unique_field(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.is_id || f.is_unique)
    }

    /// CREATE TABLE statement including foreign keys for owning relations
    pub fn create_table_sql(&self, registry: &SchemaRegistry) -> String {
        let mut parts: Vec<String> = self.fields.iter().map(FieldDef::column_sql).collect();

        for rel in self.relations.iter().filter(|r| r.is_owning()) {
            let Some(local) = self.field(rel.local_field) else {
                continue;
            };
            let Ok(target) = registry.get_entity(rel.target) else {
                continue;
            };
            let Some(referenced) = target.field(rel.target_field) else {
                continue;
            };
            parts.push(format!(
                "FOREIGN KEY (\"{}\") REFERENCES \"{}\"(\"{}\") ON DELETE {} ON UPDATE {}",
                local.column,
                target.table,
                referenced.column,
                rel.on_delete.to_sql(),
                rel.on_update.to_sql()
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n)",
            self.table,
            parts.join(",\n    ")
        )
    }

    /// Unique indexes for unique fields and plain indexes for foreign keys
    pub fn index_sql(&self) -> Vec<String> {
        let mut statements = Vec::new();
        for field in self.fields.iter().filter(|f| f.is_unique && !f.is_id) {
            statements.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"{table}_{column}_key\" ON \"{table}\"(\"{column}\")",
                table = self.table,
                column = field.column
            ));
        }
        for rel in self.relations.iter().filter(|r| r.is_owning()) {
            let Some(local) = self.field(rel.local_field) else {
                continue;
            };
            if local.is_unique {
                continue;
            }
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS \"{table}_{column}_idx\" ON \"{table}\"(\"{column}\")",
                table = self.table,
                column = local.column
            ));
        }
        statements
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug)]
pub struct SchemaRegistry {
    models: Vec<ModelDef>,
    by_name: BTreeMap<&'static str, usize>,
    shapes: BTreeMap<&'static str, InputShapes>,
}

impl SchemaRegistry {
    pub fn new(models: Vec<ModelDef>) -> Self {
        let by_name = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name, i))
            .collect();
        let shapes = models
            .iter()
            .map(|m| (m.name, InputShapes::derive(m)))
            .collect();
        Self {
            models,
            by_name,
            shapes,
        }
    }

    /// Process-wide registry for the roadmap schema
    pub fn global() -> &'static SchemaRegistry {
        &REGISTRY
    }

    pub fn get_entity(&self, name: &str) -> Result<&ModelDef> {
        self.by_name
            .get(name)
            .map(|&i| &self.models[i])
            .ok_or_else(|| OrmError::UnknownEntity(name.to_string()))
    }

    pub fn entity_by_table(&self, table: &str) -> Option<&ModelDef> {
        self.models.iter().find(|m| m.table == table)
    }

    /// Models in declaration order (parents before children)
    pub fn models(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.iter()
    }

    pub fn shapes(&self, name: &str) -> Result<&InputShapes> {
        self.shapes
            .get(name)
            .ok_or_else(|| OrmError::UnknownEntity(name.to_string()))
    }

    /// Full DDL for every model, in dependency order
    pub fn ddl(&self) -> Vec<String> {
        let mut statements = Vec::new();
        for model in &self.models {
            statements.push(model.create_table_sql(self));
            statements.extend(model.index_sql());
        }
        statements
    }

    /// Consistency problems in the definitions (empty when sound)
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for model in &self.models {
            if model.fields.iter().filter(|f| f.is_id).count() != 1 {
                problems.push(format!("{} must declare exactly one id field", model.name));
            }
            for rel in &model.relations {
                if model.field(rel.local_field).is_none() {
                    problems.push(format!(
                        "{}.{} joins on unknown field {}",
                        model.name, rel.name, rel.local_field
                    ));
                }
                match self.get_entity(rel.target) {
                    Ok(target) => {
                        if target.field(rel.target_field).is_none() {
                            problems.push(format!(
                                "{}.{} references unknown field {}.{}",
                                model.name, rel.name, rel.target, rel.target_field
                            ));
                        }
                    }
                    Err(_) => problems.push(format!(
                        "{}.{} targets unknown model {}",
                        model.name, rel.name, rel.target
                    )),
                }
            }
        }
        problems
    }
}
