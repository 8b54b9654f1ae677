//! Values stored in entities and surfaced in rows.

use crate::error::{Error, Result};
use crate::store::Key;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single property or column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// Store-native key of a referenced entity
    Key(Key),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::Key(_) => "key",
        }
    }

    /// Widen dates and times to a datetime so all temporal values share one
    /// comparable representation.
    pub fn to_comparable_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Value::Time(t) => NaiveDate::from_ymd_opt(1970, 1, 1).map(|d| d.and_time(*t)),
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
            Value::Blob(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Key(k) => write!(f, "{}", k.id),
        }
    }
}

fn invalid(kind: &'static str, input: &str) -> Error {
    Error::InvalidTemporal {
        kind,
        input: input.to_string(),
    }
}

fn parse_numbers(input: &str, sep: char, kind: &'static str) -> Result<Vec<u32>> {
    input
        .trim()
        .split(sep)
        .map(|part| part.trim().parse::<u32>().map_err(|_| invalid(kind, input)))
        .collect()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let parts = parse_numbers(input, '-', "date")?;
    match parts.as_slice() {
        [y, m, d] => {
            NaiveDate::from_ymd_opt(*y as i32, *m, *d).ok_or_else(|| invalid("date", input))
        }
        _ => Err(invalid("date", input)),
    }
}

/// Parse a `HH:MM:SS` time; seconds default to zero when omitted.
pub fn parse_time(input: &str) -> Result<NaiveTime> {
    let parts = parse_numbers(input, ':', "time")?;
    let (h, m, s) = match parts.as_slice() {
        [h, m] => (*h, *m, 0),
        [h, m, s, ..] => (*h, *m, *s),
        _ => return Err(invalid("time", input)),
    };
    NaiveTime::from_hms_opt(h, m, s).ok_or_else(|| invalid("time", input))
}

/// Parse a `YYYY-MM-DD HH:MM:SS` datetime. The date is the first ten
/// characters, the time is everything after position eleven. A bare date
/// means midnight; any other input must carry a valid time.
pub fn parse_datetime(input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();
    let date_part = input.get(..10).ok_or_else(|| invalid("datetime", input))?;
    let date = parse_date(date_part).map_err(|_| invalid("datetime", input))?;
    if input.len() == 10 {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    let rest = input.get(11..).ok_or_else(|| invalid("datetime", input))?;
    let time = parse_time(rest).map_err(|_| invalid("datetime", input))?;
    Ok(date.and_time(time))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Blob(bytes)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Key> for Value {
    fn from(k: Key) -> Self {
        Value::Key(k)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() -> anyhow::Result<()> {
        assert_eq!(parse_date("2005-06-22")?, NaiveDate::from_ymd_opt(2005, 6, 22).unwrap());
        assert_eq!(parse_date(" 1971-12-21 ")?, NaiveDate::from_ymd_opt(1971, 12, 21).unwrap());
        assert!(parse_date("2005-13-01").is_err());
        assert!(parse_date("2005/06/22").is_err());
        assert!(parse_date("").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_time_seconds_optional() -> anyhow::Result<()> {
        assert_eq!(parse_time("12:30:15")?, NaiveTime::from_hms_opt(12, 30, 15).unwrap());
        assert_eq!(parse_time("08:05")?, NaiveTime::from_hms_opt(8, 5, 0).unwrap());
        assert!(parse_time("25:00:00").is_err());
        assert!(parse_time("noon").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_datetime() -> anyhow::Result<()> {
        let expected = NaiveDate::from_ymd_opt(2002, 2, 2)
            .unwrap()
            .and_hms_opt(12, 30, 15)
            .unwrap();
        assert_eq!(parse_datetime("2002-02-02 12:30:15")?, expected);
        assert_eq!(parse_datetime("2002-02-02T12:30:15")?, expected);

        let midnight = NaiveDate::from_ymd_opt(2002, 2, 2).unwrap().and_time(NaiveTime::MIN);
        assert_eq!(parse_datetime("2002-02-02")?, midnight);
        assert!(parse_datetime("2002").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_datetime_rejects_lost_time() {
        assert!(matches!(
            parse_datetime("2002-02-02\u{e9}12:30:00"),
            Err(Error::InvalidTemporal { kind: "datetime", .. })
        ));
        assert!(parse_datetime("2002-02-02 ").is_ok());
        assert!(parse_datetime("2002-02-02 x").is_err());
        assert!(parse_datetime("2002-02-02X").is_err());
        assert!(parse_datetime("2002-02-02 25:00").is_err());
    }

    #[test]
    fn test_display_canonical_formats() {
        let dt = NaiveDate::from_ymd_opt(2002, 2, 2)
            .unwrap()
            .and_hms_opt(1, 2, 3)
            .unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "2002-02-02 01:02:03");
        assert_eq!(Value::Date(dt.date()).to_string(), "2002-02-02");
        assert_eq!(Value::Time(dt.time()).to_string(), "01:02:03");
        assert_eq!(Value::Boolean(true).to_string(), "T");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_comparable_datetime() {
        let date = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
        assert_eq!(
            Value::Date(date).to_comparable_datetime(),
            Some(date.and_time(NaiveTime::MIN))
        );
        let time = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert_eq!(
            Value::Time(time).to_comparable_datetime(),
            NaiveDate::from_ymd_opt(1970, 1, 1).map(|d| d.and_time(time))
        );
        assert_eq!(Value::Integer(1).to_comparable_datetime(), None);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".to_string()));
    }
}
