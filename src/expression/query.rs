//! Filter expressions built from fields.
//!
//! A [`Query`] is an immutable expression tree restricted to what the
//! store can execute: a conjunction of single-field comparisons, a lookup
//! by id, or every row of one table. Disjunction and negation are not
//! representable.

use crate::catalog::Field;
use crate::error::{Error, Result};
use crate::expression::coerce;
use crate::store::{FilterOp, Key};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    /// Another column; the store cannot compare two properties.
    Column(String),
}

macro_rules! operand_from_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(v.into())
                }
            }
        )*
    };
}

operand_from_value!(
    Value,
    bool,
    i32,
    i64,
    f64,
    &str,
    String,
    Vec<u8>,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    Key,
);

impl From<&Field> for Operand {
    fn from(field: &Field) -> Self {
        Operand::Column(field.qualified_name())
    }
}

/// `table.field op value`, with the value already coerced for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub table: String,
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} {} {:?}", self.table, self.field, self.op, self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Conjunction of one or more predicates
    Filter(Vec<Predicate>),
    /// Exactly the row with this id
    ById { table: String, id: i64 },
    /// Every row of the table
    All { table: String },
}

impl Query {
    /// Conjoin two filter expressions.
    ///
    /// By-id and all-rows expressions cannot be combined with anything.
    pub fn and(self, other: Query) -> Result<Query> {
        match (self, other) {
            (Query::Filter(mut left), Query::Filter(right)) => {
                left.extend(right);
                Ok(Query::Filter(left))
            }
            _ => Err(Error::NotCombinable),
        }
    }

    /// Distinct table names referenced, in first-seen order.
    pub fn tables(&self) -> Vec<&str> {
        match self {
            Query::Filter(predicates) => {
                let mut tables: Vec<&str> = Vec::new();
                for p in predicates {
                    if !tables.contains(&p.table.as_str()) {
                        tables.push(p.table.as_str());
                    }
                }
                tables
            }
            Query::ById { table, .. } | Query::All { table } => vec![table.as_str()],
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        match self {
            Query::Filter(predicates) => predicates,
            _ => &[],
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Filter(predicates) => {
                for (i, p) in predicates.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    write!(f, "{}", p)?;
                }
                Ok(())
            }
            Query::ById { table, id } => write!(f, "{}.id = {}", table, id),
            Query::All { table } => write!(f, "{}.id > 0", table),
        }
    }
}

impl Field {
    pub fn equals(&self, operand: impl Into<Operand>) -> Result<Query> {
        self.compare(FilterOp::Eq, operand.into())
    }

    pub fn not_equals(&self, operand: impl Into<Operand>) -> Result<Query> {
        self.compare(FilterOp::Ne, operand.into())
    }

    pub fn less_than(&self, operand: impl Into<Operand>) -> Result<Query> {
        self.compare(FilterOp::Lt, operand.into())
    }

    pub fn less_or_equal(&self, operand: impl Into<Operand>) -> Result<Query> {
        self.compare(FilterOp::Le, operand.into())
    }

    pub fn greater_than(&self, operand: impl Into<Operand>) -> Result<Query> {
        self.compare(FilterOp::Gt, operand.into())
    }

    pub fn greater_or_equal(&self, operand: impl Into<Operand>) -> Result<Query> {
        self.compare(FilterOp::Ge, operand.into())
    }

    fn compare(&self, op: FilterOp, operand: Operand) -> Result<Query> {
        let value = match operand {
            Operand::Value(value) => value,
            Operand::Column(_) => {
                return Err(Error::ColumnOperand {
                    field: self.qualified_name(),
                })
            }
        };
        if self.is_id() {
            return self.compare_id(op, value);
        }
        if !self.field_type().is_filterable() {
            return Err(Error::NotFilterable {
                field: self.qualified_name(),
                field_type: self.field_type().to_string(),
            });
        }
        let value = coerce::filter_value(coerce::represent(self, value)?);
        Ok(Query::Filter(vec![Predicate {
            table: self.table_name().to_string(),
            field: self.name().to_string(),
            op,
            value,
        }]))
    }

    /// The id field only supports `id == k` and `id > 0`.
    fn compare_id(&self, op: FilterOp, value: Value) -> Result<Query> {
        let table = self.table_name().to_string();
        match (op, value) {
            (FilterOp::Eq, Value::Integer(id)) => Ok(Query::ById { table, id }),
            (FilterOp::Eq, Value::Key(key)) => {
                if key.kind != table {
                    return Err(Error::IncompatibleEntity {
                        expected: table,
                        actual: key.kind,
                    });
                }
                Ok(Query::ById { table, id: key.id })
            }
            (FilterOp::Eq, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(id) => Ok(Query::ById { table, id }),
                Err(_) => Err(Error::Coercion {
                    field: self.qualified_name(),
                    field_type: self.field_type().to_string(),
                    value: s,
                }),
            },
            (FilterOp::Gt, Value::Integer(0)) => Ok(Query::All { table }),
            (FilterOp::Gt, Value::String(s)) if s == "0" => Ok(Query::All { table }),
            (op, _) => Err(Error::UnsupportedIdComparison {
                op: op.as_str().to_string(),
            }),
        }
    }
}
