//! Dynamic values stored in entities and exchanged with the field pipeline.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::{
    entity::Entity,
    errors::{ModelError, ModelResult},
    field::FieldType,
    model::Model,
};

/// A user-facing or base-typed field value.
///
/// Repeated fields hold a `List`; single fields hold any other variant, with `Null`
/// standing for an explicitly assigned null.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A naive instant, always interpreted as UTC.
    DateTime(NaiveDateTime),
    /// An instant carrying an explicit offset. Only a zero offset can be stored.
    ZonedDateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(JsonValue),
    Entity(Box<Entity>),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::DateTime(_) => "datetime",
            Value::ZonedDateTime(_) => "datetime with offset",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Json(_) => "json",
            Value::Entity(_) => "entity",
            Value::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value.naive_utc())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::ZonedDateTime(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(value)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::Json(value)
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Value::Entity(Box::new(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::Text(value) => serializer.serialize_str(value),
            Value::DateTime(value) => value.serialize(serializer),
            Value::ZonedDateTime(value) => value.serialize(serializer),
            Value::Date(value) => value.serialize(serializer),
            Value::Time(value) => value.serialize(serializer),
            Value::Json(value) => value.serialize(serializer),
            Value::Entity(entity) => entity.serialize(serializer),
            Value::List(values) => values.serialize(serializer),
        }
    }
}

/// Expected top-level shape of a JSON payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Object,
    Array,
    String,
    Number,
    Bool,
}

impl JsonType {
    pub fn matches(self, value: &JsonValue) -> bool {
        match self {
            JsonType::Object => value.is_object(),
            JsonType::Array => value.is_array(),
            JsonType::String => value.is_string(),
            JsonType::Number => value.is_number(),
            JsonType::Bool => value.is_boolean(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            JsonType::Object => "object",
            JsonType::Array => "array",
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Bool => "bool",
        }
    }
}

/// Decode a single (non-repeated) JSON value into the user representation of a field type.
///
/// `nested` must be set for structured fields.
pub(crate) fn value_from_json(
    field: &str,
    field_type: FieldType,
    nested: Option<&Arc<Model>>,
    json: &JsonValue,
) -> ModelResult<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || ModelError::bad_value(field, format!("cannot read {field_type} from JSON {json}"));
    let value = match field_type {
        FieldType::Boolean => Value::Bool(json.as_bool().ok_or_else(mismatch)?),
        FieldType::Integer => Value::Int(json.as_i64().ok_or_else(mismatch)?),
        FieldType::Float => Value::Float(json.as_f64().ok_or_else(mismatch)?),
        FieldType::Text | FieldType::String => Value::Text(json.as_str().ok_or_else(mismatch)?.to_string()),
        FieldType::Json => Value::Json(json.clone()),
        FieldType::DateTime => {
            let raw = json.as_str().ok_or_else(mismatch)?;
            match raw.parse::<NaiveDateTime>() {
                Ok(naive) => Value::DateTime(naive),
                Err(_) => DateTime::parse_from_rfc3339(raw)
                    .map(Value::ZonedDateTime)
                    .map_err(|err| ModelError::bad_value(field, format!("invalid datetime {raw:?}: {err}")))?,
            }
        }
        FieldType::Date => {
            let raw = json.as_str().ok_or_else(mismatch)?;
            Value::Date(
                raw.parse::<NaiveDate>()
                    .map_err(|err| ModelError::bad_value(field, format!("invalid date {raw:?}: {err}")))?,
            )
        }
        FieldType::Time => {
            let raw = json.as_str().ok_or_else(mismatch)?;
            Value::Time(
                raw.parse::<NaiveTime>()
                    .map_err(|err| ModelError::bad_value(field, format!("invalid time {raw:?}: {err}")))?,
            )
        }
        FieldType::Structured => {
            let model = nested.ok_or_else(|| ModelError::internal(format!("structured field {field} has no model")))?;
            Value::Entity(Box::new(Entity::from_json(model, json)?))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_type_matches_top_level_shape() {
        assert!(JsonType::Object.matches(&json!({"a": 1})));
        assert!(!JsonType::Object.matches(&json!([1])));
        assert!(JsonType::Array.matches(&json!([1, 2])));
        assert!(JsonType::Number.matches(&json!(2.5)));
        assert!(JsonType::Bool.matches(&json!(false)));
        assert!(JsonType::String.matches(&json!("x")));
    }

    #[test]
    fn reads_temporal_values_from_iso_text() {
        let value = value_from_json("born", FieldType::DateTime, None, &json!("2020-01-01T10:30:00")).unwrap();
        let expected = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(value, Value::DateTime(expected));

        let zoned = value_from_json("born", FieldType::DateTime, None, &json!("2020-01-01T10:30:00+02:00")).unwrap();
        assert!(matches!(zoned, Value::ZonedDateTime(_)));

        let date = value_from_json("day", FieldType::Date, None, &json!("2021-02-03")).unwrap();
        assert_eq!(date, Value::Date(NaiveDate::from_ymd_opt(2021, 2, 3).unwrap()));
    }

    #[test]
    fn rejects_mismatched_json() {
        let err = value_from_json("count", FieldType::Integer, None, &json!("seven")).unwrap_err();
        assert!(matches!(err, ModelError::BadValue { .. }));
    }

    #[test]
    fn serializes_scalars_and_lists() {
        let value = Value::from(vec!["a", "b"]);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(["a", "b"]));
        let day = Value::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(serde_json::to_value(&day).unwrap(), json!("2020-01-01"));
    }
}
