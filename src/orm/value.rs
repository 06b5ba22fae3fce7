//! Dynamic values and records
//!
//! `Value` is a scalar as seen by the query layer, `SqlValue` is what gets
//! bound to a sqlx query, and `Record` is one decoded row together with any
//! relations resolved for it. Typed entity structs convert to and from
//! `Record` through serde.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::db::sqlite_helpers::{bool_to_int, datetime_to_str, int_to_bool, str_to_datetime};
use crate::error::{OrmError, Result};
use crate::schema::{FieldDef, FieldType, ModelDef};

// ============================================================================
// Value
// ============================================================================

/// A scalar value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Convert to the type of `field`, rejecting mismatches.
    pub(crate) fn coerce(self, model: &ModelDef, field: &FieldDef) -> Result<Value> {
        let invalid = || OrmError::InvalidValue {
            model: model.name.to_string(),
            field: field.name.to_string(),
            expected: if field.nullable {
                format!("{}?", field.field_type)
            } else {
                field.field_type.to_string()
            },
        };

        match (field.field_type, self) {
            (_, Value::Null) if field.nullable => Ok(Value::Null),
            (_, Value::Null) => Err(invalid()),
            (FieldType::String, v @ Value::String(_)) => Ok(v),
            (FieldType::Boolean, v @ Value::Bool(_)) => Ok(v),
            (FieldType::Int, v @ Value::Int(_)) => Ok(v),
            (FieldType::Float, v @ Value::Float(_)) => Ok(v),
            (FieldType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (FieldType::DateTime, v @ Value::DateTime(_)) => Ok(v),
            (FieldType::DateTime, Value::String(s)) => {
                str_to_datetime(&s).map(Value::DateTime).ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }

    /// Bindable form
    pub fn to_sql(&self) -> SqlValue {
        match self {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Int(i) => SqlValue::Int(*i),
            Value::Float(f) => SqlValue::Float(*f),
            Value::String(s) => SqlValue::String(s.clone()),
            Value::DateTime(dt) => SqlValue::String(datetime_to_str(*dt)),
        }
    }

    /// Key used to group rows by a join column
    pub(crate) fn group_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::DateTime(dt) => Some(datetime_to_str(*dt)),
        }
    }

    fn from_json(model: &ModelDef, field: &FieldDef, json: &serde_json::Value) -> Result<Value> {
        let value = match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match field.field_type {
                FieldType::Int => n.as_i64().map(Value::Int).unwrap_or(Value::Null),
                _ => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            _ => {
                return Err(OrmError::InvalidValue {
                    model: model.name.to_string(),
                    field: field.name.to_string(),
                    expected: field.field_type.to_string(),
                });
            }
        };
        value.coerce(model, field)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// SqlValue
// ============================================================================

/// A value bound to a parameterized query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query at the next parameter position
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(bool_to_int(*b)),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// Related rows attached to a record by include or lazy loading.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl Serialize for Related {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Related::One(one) => one.serialize(serializer),
            Related::Many(many) => many.serialize(serializer),
        }
    }
}

/// One row: scalar values keyed by API field name plus resolved relations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: BTreeMap<String, Value>,
    relations: BTreeMap<String, Related>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    /// Single related row, `None` when absent or not loaded
    pub fn related_one(&self, name: &str) -> Option<&Record> {
        match self.relations.get(name) {
            Some(Related::One(Some(record))) => Some(record),
            _ => None,
        }
    }

    /// Related rows, empty when not loaded
    pub fn related_many(&self, name: &str) -> &[Record] {
        match self.relations.get(name) {
            Some(Related::Many(records)) => records,
            _ => &[],
        }
    }

    pub(crate) fn set_relation(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }

    pub(crate) fn retain_fields(&mut self, keep: impl Fn(&str) -> bool) {
        self.values.retain(|k, _| keep(k));
    }

    /// Deserialize into a typed entity.
    pub fn into_entity<M: DeserializeOwned>(self) -> Result<M> {
        let json = serde_json::to_value(&self)?;
        Ok(serde_json::from_value(json)?)
    }

    /// Build a record from a typed entity, keeping only the model's scalar fields.
    pub fn from_entity<M: Serialize>(model: &ModelDef, entity: &M) -> Result<Self> {
        let json = serde_json::to_value(entity)?;
        let serde_json::Value::Object(map) = json else {
            return Err(OrmError::invalid(format!(
                "{} must serialize to an object",
                model.name
            )));
        };

        let mut record = Record::new();
        for field in &model.fields {
            if let Some(value) = map.get(field.name) {
                record.set(field.name, Value::from_json(model, field, value)?);
            }
        }
        Ok(record)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + self.relations.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(k, v)?;
        }
        for (k, v) in &self.relations {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ============================================================================
// Row decoding
// ============================================================================

/// Decode a row selected with `select_columns(model, ..)`: one column per
/// field, in declaration order, starting at `offset`.
pub(crate) fn decode_model_row(model: &ModelDef, row: &SqliteRow, offset: usize) -> Result<Record> {
    let mut record = Record::new();
    for (i, field) in model.fields.iter().enumerate() {
        let value = decode_field(model, field, row, offset + i)?;
        record.set(field.name, value);
    }
    Ok(record)
}

/// Decode one column as the given field's type.
pub(crate) fn decode_field(
    model: &ModelDef,
    field: &FieldDef,
    row: &SqliteRow,
    index: usize,
) -> Result<Value> {
    decode_typed(model, field.name, field.field_type, row, index)
}

pub(crate) fn decode_typed(
    model: &ModelDef,
    name: &str,
    field_type: FieldType,
    row: &SqliteRow,
    index: usize,
) -> Result<Value> {
    let value = match field_type {
        FieldType::String => row.try_get::<Option<String>, _>(index)?.map(Value::String),
        FieldType::Boolean => row
            .try_get::<Option<i64>, _>(index)?
            .map(|i| Value::Bool(int_to_bool(i))),
        FieldType::Int => row.try_get::<Option<i64>, _>(index)?.map(Value::Int),
        FieldType::Float => row.try_get::<Option<f64>, _>(index)?.map(Value::Float),
        FieldType::DateTime => match row.try_get::<Option<String>, _>(index)? {
            Some(s) => Some(str_to_datetime(&s).map(Value::DateTime).ok_or_else(|| {
                OrmError::InvalidValue {
                    model: model.name.to_string(),
                    field: name.to_string(),
                    expected: "DateTime".to_string(),
                }
            })?),
            None => None,
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decode a row of unknown shape (raw queries), keyed by column name.
pub(crate) fn decode_dynamic_row(row: &SqliteRow) -> Result<Record> {
    use sqlx::{Column, ValueRef};

    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else if let Ok(v) = row.try_get::<i64, _>(i) {
            Value::Int(v)
        } else if let Ok(v) = row.try_get::<f64, _>(i) {
            Value::Float(v)
        } else if let Ok(v) = row.try_get::<String, _>(i) {
            Value::String(v)
        } else {
            let bytes: Vec<u8> = row.try_get(i)?;
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        };
        record.set(column.name(), value);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn node() -> &'static ModelDef {
        SchemaRegistry::global().get_entity("Node").unwrap()
    }

    #[test]
    fn test_coerce_int_to_float() {
        let model = node();
        let field = model.field("positionX").unwrap();
        assert_eq!(Value::Int(3).coerce(model, field).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_coerce_rejects_null_on_required() {
        let model = node();
        let field = model.field("title").unwrap();
        let err = Value::Null.coerce(model, field).unwrap_err();
        assert!(matches!(err, OrmError::InvalidValue { field, .. } if field == "title"));
    }

    #[test]
    fn test_coerce_parses_datetime_strings() {
        let model = SchemaRegistry::global().get_entity("User").unwrap();
        let field = model.field("createdAt").unwrap();
        let value = Value::from("2024-05-01T12:00:00Z").coerce(model, field).unwrap();
        assert_eq!(
            value,
            Value::DateTime(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_coerce_rejects_type_mismatch() {
        let model = node();
        let field = model.field("title").unwrap();
        assert!(Value::Bool(true).coerce(model, field).is_err());
    }

    #[test]
    fn test_record_serializes_flat() {
        let mut record = Record::new();
        record.set("id", "n1");
        record.set("parentId", Value::Null);
        let mut child = Record::new();
        child.set("id", "n2");
        record.set_relation("children", Related::Many(vec![child]));
        record.set_relation("parent", Related::One(None));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "n1",
                "parentId": null,
                "children": [{"id": "n2"}],
                "parent": null,
            })
        );
    }

    #[test]
    fn test_from_entity_keeps_scalar_fields() {
        let model = node();
        let json = serde_json::json!({
            "id": "n1",
            "roadMapId": "r1",
            "title": "Root",
            "positionX": 1.5,
            "positionY": 0,
            "positionZ": 0.0,
            "parentId": null,
            "children": [],
        });
        let record = Record::from_entity(model, &json).unwrap();
        assert_eq!(record.get("positionX"), Some(&Value::Float(1.5)));
        assert_eq!(record.get("positionY"), Some(&Value::Float(0.0)));
        assert_eq!(record.get("parentId"), Some(&Value::Null));
        assert!(record.get("children").is_none());
    }

    #[test]
    fn test_datetime_binds_as_fixed_width_text() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Value::DateTime(dt).to_sql(),
            SqlValue::String("2024-01-01T00:00:00.000000000Z".to_string())
        );
    }
}
