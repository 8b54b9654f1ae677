//! Input validators attached to fields.

use crate::catalog::FieldType;
use crate::value::{self, Value, DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};

/// Validator for values entered into a field.
///
/// Temporal validators double as output formatters that render native
/// values back into their canonical text form.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// Integer in `[min, max)`
    IntInRange { min: i64, max: i64 },
    /// Float in `[min, max)`
    FloatInRange { min: f64, max: f64 },
    /// At most this many characters (or bytes, for blobs)
    Length(usize),
    Date,
    Time,
    DateTime,
    NotEmpty,
}

impl Validator {
    /// Default validators for a field type.
    pub fn defaults(field_type: &FieldType, length: Option<usize>) -> Vec<Validator> {
        match field_type {
            FieldType::String | FieldType::Password => {
                length.map(Validator::Length).into_iter().collect()
            }
            FieldType::Integer => vec![Validator::IntInRange {
                min: i64::MIN,
                max: i64::MAX,
            }],
            FieldType::Double => vec![Validator::FloatInRange {
                min: -1e100,
                max: 1e100,
            }],
            FieldType::Date => vec![Validator::Date],
            FieldType::Time => vec![Validator::Time],
            FieldType::DateTime => vec![Validator::DateTime],
            FieldType::Reference(_) => vec![Validator::IntInRange {
                min: 0,
                max: i64::MAX,
            }],
            _ => Vec::new(),
        }
    }

    /// Check `value`, returning its normalized form or a message for the user.
    pub fn validate(&self, value: &Value) -> Result<Value, String> {
        match self {
            Validator::IntInRange { min, max } => {
                let parsed = match value {
                    Value::Integer(i) => Some(*i),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                match parsed {
                    Some(i) if i >= *min && i < *max => Ok(Value::Integer(i)),
                    _ => Err(format!("enter an integer between {} and {}", min, max)),
                }
            }
            Validator::FloatInRange { min, max } => {
                let parsed = match value {
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    other => other.as_f64(),
                };
                match parsed {
                    Some(d) if d >= *min && d < *max => Ok(Value::Double(d)),
                    _ => Err(format!("enter a number between {} and {}", min, max)),
                }
            }
            Validator::Length(max) => {
                let len = match value {
                    Value::String(s) => s.chars().count(),
                    Value::Blob(b) => b.len(),
                    _ => 0,
                };
                if len <= *max {
                    Ok(value.clone())
                } else {
                    Err(format!("enter at most {} characters", max))
                }
            }
            Validator::Date => match value {
                Value::Date(_) => Ok(value.clone()),
                Value::String(s) => value::parse_date(s)
                    .map(Value::Date)
                    .map_err(|_| "enter date as YYYY-MM-DD".to_string()),
                _ => Err("enter date as YYYY-MM-DD".to_string()),
            },
            Validator::Time => match value {
                Value::Time(_) => Ok(value.clone()),
                Value::String(s) => value::parse_time(s)
                    .map(Value::Time)
                    .map_err(|_| "enter time as HH:MM:SS".to_string()),
                _ => Err("enter time as HH:MM:SS".to_string()),
            },
            Validator::DateTime => match value {
                Value::DateTime(_) => Ok(value.clone()),
                Value::String(s) => value::parse_datetime(s)
                    .map(Value::DateTime)
                    .map_err(|_| "enter date and time as YYYY-MM-DD HH:MM:SS".to_string()),
                _ => Err("enter date and time as YYYY-MM-DD HH:MM:SS".to_string()),
            },
            Validator::NotEmpty => match value {
                Value::Null => Err("cannot be empty".to_string()),
                Value::String(s) if s.trim().is_empty() => Err("cannot be empty".to_string()),
                _ => Ok(value.clone()),
            },
        }
    }

    pub fn has_formatter(&self) -> bool {
        matches!(self, Validator::Date | Validator::Time | Validator::DateTime)
    }

    /// Render a value for output. Values this validator does not format
    /// pass through unchanged.
    pub fn format(&self, value: Value) -> Value {
        match (self, value) {
            (Validator::Date, Value::Date(d)) => Value::String(d.format(DATE_FORMAT).to_string()),
            (Validator::Time, Value::Time(t)) => Value::String(t.format(TIME_FORMAT).to_string()),
            (Validator::DateTime, Value::DateTime(dt)) => {
                Value::String(dt.format(DATETIME_FORMAT).to_string())
            }
            (_, other) => other,
        }
    }
}
