//! Backing entity store contract.
//!
//! The store is a schemaless, kind-keyed entity store. It supports typed
//! property registration, put/get/delete by key, and a single-kind query
//! with conjunctive property filters, ordering, and offset/limit paging.
//! There are no joins, no disjunction, and no aggregation.

pub mod error;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Pseudo-property that orders by entity key.
pub const KEY_PROPERTY: &str = "__key__";

/// Store key: kind plus a per-kind auto-incrementing id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub kind: String,
    pub id: i64,
}

impl Key {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

/// One schemaless record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    kind: String,
    key: Option<Key>,
    properties: BTreeMap<String, Value>,
}

impl Entity {
    /// Create an unsaved entity of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: None,
            properties: BTreeMap::new(),
        }
    }

    pub(crate) fn with_key(key: Key, properties: BTreeMap<String, Value>) -> Self {
        Self {
            kind: key.kind.clone(),
            key: Some(key),
            properties,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Missing properties read as `None`.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    pub fn set(&mut self, property: impl Into<String>, value: Value) {
        self.properties.insert(property.into(), value);
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub(crate) fn into_properties(self) -> BTreeMap<String, Value> {
        self.properties
    }
}

/// Native property types of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    Boolean,
    String,
    /// Long text, not indexed
    Text,
    /// Binary data, not indexed
    Blob,
    Integer,
    Float,
    Date,
    Time,
    DateTime,
    Reference(String),
}

impl PropertyType {
    pub fn is_indexed(&self) -> bool {
        !matches!(self, PropertyType::Text | PropertyType::Blob)
    }

    /// Convert a value into this property's native representation, or
    /// `None` if it is not acceptable.
    pub fn normalize(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (PropertyType::Boolean, v @ Value::Boolean(_)) => Some(v),
            (PropertyType::String | PropertyType::Text, v @ Value::String(_)) => Some(v),
            (PropertyType::Blob, v @ Value::Blob(_)) => Some(v),
            (PropertyType::Blob, Value::String(s)) => Some(Value::Blob(s.into_bytes())),
            (PropertyType::Integer, v @ Value::Integer(_)) => Some(v),
            (PropertyType::Float, v @ Value::Double(_)) => Some(v),
            (PropertyType::Float, Value::Integer(i)) => Some(Value::Double(i as f64)),
            (PropertyType::Date, v @ Value::Date(_)) => Some(v),
            (PropertyType::Date, Value::DateTime(dt)) => Some(Value::Date(dt.date())),
            (PropertyType::Time, v @ Value::Time(_)) => Some(v),
            (PropertyType::Time, Value::DateTime(dt)) => Some(Value::Time(dt.time())),
            (PropertyType::DateTime, v @ Value::DateTime(_)) => Some(v),
            (PropertyType::DateTime, v @ Value::Date(_)) => {
                v.to_comparable_datetime().map(Value::DateTime)
            }
            (PropertyType::Reference(kind), Value::Key(key)) if &key.kind == kind => {
                Some(Value::Key(key))
            }
            _ => None,
        }
    }
}

/// A typed property registered for a kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub property_type: PropertyType,
    pub required: bool,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            required: false,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Native filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }

    /// Whether a property comparing as `ordering` against the filter value
    /// satisfies this operator.
    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Ne => ordering != Ordering::Equal,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Le => ordering != Ordering::Greater,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub property: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
}

/// A single-kind query.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub kind: String,
    pub filters: Vec<PropertyFilter>,
    pub orders: Vec<Order>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl StoreQuery {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
            orders: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    pub fn filter(mut self, property: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(PropertyFilter {
            property: property.into(),
            op,
            value,
        });
        self
    }

    pub fn order(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(Order {
            property: property.into(),
            direction,
        });
        self
    }

    pub fn fetch(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }
}

impl fmt::Display for StoreQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT * FROM {}", self.kind)?;
        for (i, filter) in self.filters.iter().enumerate() {
            let sep = if i == 0 { " WHERE" } else { " AND" };
            write!(f, "{} {} {} {:?}", sep, filter.property, filter.op, filter.value)?;
        }
        for (i, order) in self.orders.iter().enumerate() {
            let sep = if i == 0 { " ORDER BY" } else { "," };
            let dir = match order.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            write!(f, "{} {} {}", sep, order.property, dir)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if self.offset > 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        Ok(())
    }
}

/// Trait for entity stores.
///
/// Every call is a blocking round trip. Implementations provide their own
/// interior synchronization.
pub trait EntityStore: Send + Sync {
    /// Register (or re-register) the typed properties of a kind.
    fn create_kind(&self, kind: &str, properties: &[PropertyDef]) -> StoreResult<()>;

    /// Insert an entity without a key, or overwrite the keyed entity.
    /// Returns the entity's key.
    fn put(&self, entity: Entity) -> StoreResult<Key>;

    fn get(&self, key: &Key) -> StoreResult<Option<Entity>>;

    /// Returns whether an entity was removed.
    fn delete(&self, key: &Key) -> StoreResult<bool>;

    fn query(&self, query: &StoreQuery) -> StoreResult<Vec<Entity>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_normalize_property_values() {
        assert_eq!(
            PropertyType::Float.normalize(Value::Integer(3)),
            Some(Value::Double(3.0))
        );
        assert_eq!(PropertyType::Integer.normalize(Value::Double(3.0)), None);
        assert_eq!(
            PropertyType::Reference("person".into()).normalize(Value::Key(Key::new("dog", 1))),
            None
        );
        assert_eq!(PropertyType::Boolean.normalize(Value::Null), Some(Value::Null));

        let dt = NaiveDate::from_ymd_opt(2001, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(
            PropertyType::Date.normalize(Value::DateTime(dt)),
            Some(Value::Date(dt.date()))
        );
    }

    #[test]
    fn test_filter_op_matches() {
        assert!(FilterOp::Le.matches(Ordering::Equal));
        assert!(FilterOp::Le.matches(Ordering::Less));
        assert!(!FilterOp::Lt.matches(Ordering::Equal));
        assert!(FilterOp::Ne.matches(Ordering::Greater));
        assert!(!FilterOp::Eq.matches(Ordering::Greater));
    }

    #[test]
    fn test_query_display() {
        let query = StoreQuery::new("person")
            .filter("name", FilterOp::Eq, Value::from("Max"))
            .order("birth", Direction::Descending)
            .fetch(10, 5);
        assert_eq!(
            query.to_string(),
            "SELECT * FROM person WHERE name = String(\"Max\") ORDER BY birth DESC LIMIT 10 OFFSET 5"
        );
    }
}
