//! Coercion of values into and out of a field's semantic type.

use crate::catalog::{Field, FieldType};
use crate::error::{Error, Result};
use crate::store::Key;
use crate::value::{self, Value};

fn mismatch(field: &Field, value: &Value) -> Error {
    Error::Coercion {
        field: field.qualified_name(),
        field_type: field.field_type().to_string(),
        value: format!("{:?}", value),
    }
}

/// Coerce a value for writing into `field` or comparing against it.
///
/// Integer ids become store keys for reference fields and canonical strings
/// become temporal values. Values already in the target form are returned
/// unchanged, so coercion is idempotent.
pub fn represent(field: &Field, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(value);
    }
    match field.field_type() {
        FieldType::Reference(table) => match value {
            Value::Integer(id) => Ok(Value::Key(Key::new(table.as_str(), id))),
            Value::Key(key) if &key.kind == table => Ok(Value::Key(key)),
            Value::Key(key) => Err(Error::IncompatibleEntity {
                expected: table.clone(),
                actual: key.kind,
            }),
            other => Err(mismatch(field, &other)),
        },
        FieldType::Date => match value {
            Value::Date(_) | Value::DateTime(_) => Ok(value),
            Value::String(s) => Ok(Value::Date(value::parse_date(&s)?)),
            other => Err(mismatch(field, &other)),
        },
        FieldType::Time => match value {
            Value::Time(_) => Ok(value),
            Value::DateTime(dt) => Ok(Value::Time(dt.time())),
            Value::String(s) => Ok(Value::Time(value::parse_time(&s)?)),
            other => Err(mismatch(field, &other)),
        },
        FieldType::DateTime => match value {
            Value::DateTime(_) => Ok(value),
            Value::Date(_) => Ok(value.to_comparable_datetime().map_or(value, Value::DateTime)),
            Value::String(s) => Ok(Value::DateTime(value::parse_datetime(&s)?)),
            other => Err(mismatch(field, &other)),
        },
        _ => Ok(value),
    }
}

/// Temporal filter values are compared by the store as datetimes.
pub fn filter_value(value: Value) -> Value {
    match value.to_comparable_datetime() {
        Some(dt) => Value::DateTime(dt),
        None => value,
    }
}

/// Convert a raw store value into the native row value for `field_type`.
pub fn materialize(field_type: &FieldType, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(value);
    }
    Ok(match (field_type, value) {
        (FieldType::Id | FieldType::Reference(_), Value::Key(key)) => Value::Integer(key.id),
        (FieldType::Boolean, value) => Value::Boolean(matches!(
            &value,
            Value::Boolean(true) | Value::Integer(1)
        ) || value.as_str() == Some("T")),
        (FieldType::Date, Value::DateTime(dt)) => Value::Date(dt.date()),
        (FieldType::Date, Value::String(s)) => Value::Date(value::parse_date(&s)?),
        (FieldType::Time, Value::DateTime(dt)) => Value::Time(dt.time()),
        (FieldType::Time, Value::String(s)) => Value::Time(value::parse_time(&s)?),
        (FieldType::DateTime, Value::String(s)) => Value::DateTime(value::parse_datetime(&s)?),
        (FieldType::DateTime, value @ Value::Date(_)) => filter_value(value),
        (
            FieldType::String | FieldType::Text | FieldType::Password | FieldType::Upload,
            Value::Blob(bytes),
        ) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        (_, value) => value,
    })
}
