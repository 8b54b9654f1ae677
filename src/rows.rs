//! Row materialization.
//!
//! Raw entity values are converted into typed [`Record`]s, one per table
//! participating in a row. A row with a single table is flattened to that
//! table's record. Records that carry their id can update themselves and
//! build the sets of rows that reference them.

use crate::catalog::{BackReference, Catalog, Table};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::expression::coerce;
use crate::set::QuerySet;
use crate::store::Key;
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use std::fmt;

/// A fully qualified output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub table: String,
    pub field: String,
}

impl Column {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Every column of `table`, in field order.
    pub fn all(table: &Table) -> Vec<Column> {
        table
            .fields()
            .iter()
            .map(|f| Column::new(table.name(), f.name()))
            .collect()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.field)
    }
}

/// The values one table contributes to a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    table: String,
    id: Option<i64>,
    values: Vec<(String, Value)>,
    back_references: Vec<BackReference>,
}

impl Record {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            id: None,
            values: Vec::new(),
            back_references: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The row id, when the id column was selected.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// `(field, value)` pairs in column order.
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_date(&self, field: &str) -> Option<NaiveDate> {
        self.get(field).and_then(Value::as_date)
    }

    pub fn get_time(&self, field: &str) -> Option<NaiveTime> {
        self.get(field).and_then(Value::as_time)
    }

    pub fn get_datetime(&self, field: &str) -> Option<NaiveDateTime> {
        self.get(field).and_then(Value::as_datetime)
    }

    /// Tables (and their fields) that reference this record's table.
    pub fn back_references(&self) -> &[BackReference] {
        &self.back_references
    }

    fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| {
            Error::Unsupported(format!(
                "record of {} was selected without its id column",
                self.table
            ))
        })
    }

    /// Rows of `table` whose reference field points at this record.
    pub fn referencing<'db>(&self, db: &'db Database, table: &str) -> Result<QuerySet<'db>> {
        let mut candidates = self.back_references.iter().filter(|r| r.table == table);
        let back_ref = candidates.next().ok_or_else(|| Error::UnknownField {
            table: self.table.clone(),
            field: table.to_string(),
        })?;
        if candidates.next().is_some() {
            return Err(Error::AmbiguousBackReference {
                table: table.to_string(),
                referenced: self.table.clone(),
            });
        }
        self.referencing_via(db, table, &back_ref.field)
    }

    /// Rows of `table` whose `field` points at this record.
    pub fn referencing_via<'db>(
        &self,
        db: &'db Database,
        table: &str,
        field: &str,
    ) -> Result<QuerySet<'db>> {
        let id = self.require_id()?;
        if !self
            .back_references
            .iter()
            .any(|r| r.table == table && r.field == field)
        {
            return Err(Error::UnknownField {
                table: self.table.clone(),
                field: format!("{}.{}", table, field),
            });
        }
        let query = db.table(table)?.field(field)?.equals(id)?;
        db.set(query)
    }

    /// Write `values` to this record's entity and to this record.
    ///
    /// Other materialized copies of the same row are not touched. Fails
    /// without changing the record if the entity has been deleted.
    pub fn update_record(&mut self, db: &Database, values: &[(&str, Value)]) -> Result<()> {
        let id = self.require_id()?;
        let table = db.table(&self.table)?;
        let assignments = table.coerce_values(values)?;

        let key = Key::new(self.table.as_str(), id);
        let mut entity = db.store().get(&key)?.ok_or_else(|| Error::EntityNotFound {
            table: self.table.clone(),
            id,
        })?;
        for (name, value) in &assignments {
            entity.set(name.as_str(), value.clone());
        }
        db.store().put(entity)?;
        debug!("update_record {}", key);

        for (name, value) in assignments {
            let value = coerce::materialize(table.field(&name)?.field_type(), value)?;
            match self.values.iter_mut().find(|(n, _)| *n == name) {
                Some((_, slot)) => *slot = value,
                None => self.values.push((name, value)),
            }
        }
        Ok(())
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// Only one table participates; its record is the row.
    Flat(Record),
    Nested(Vec<Record>),
}

impl Row {
    /// The record of a single-table row.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Row::Flat(record) => Some(record),
            Row::Nested(_) => None,
        }
    }

    pub fn record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Row::Flat(record) => Some(record),
            Row::Nested(_) => None,
        }
    }

    pub fn table(&self, name: &str) -> Option<&Record> {
        match self {
            Row::Flat(record) => Some(record).filter(|r| r.table == name),
            Row::Nested(records) => records.iter().find(|r| r.table == name),
        }
    }

    pub fn get(&self, table: &str, field: &str) -> Option<&Value> {
        self.table(table).and_then(|r| r.get(field))
    }
}

/// The result of a select.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rows {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Rows {
    /// Convert raw values, one inner vector per entity in column order,
    /// into typed rows.
    pub fn materialize(catalog: &Catalog, columns: Vec<Column>, raw: Vec<Vec<Value>>) -> Result<Self> {
        let mut rows = Vec::with_capacity(raw.len());
        for values in raw {
            if values.len() != columns.len() {
                return Err(Error::MalformedRow {
                    expected: columns.len(),
                    actual: values.len(),
                });
            }

            let mut records: Vec<Record> = Vec::new();
            for (column, value) in columns.iter().zip(values) {
                let table = catalog.table(&column.table)?;
                let field = table.field(&column.field)?;
                let value = coerce::materialize(field.field_type(), value)?;

                let index = match records.iter().position(|r| r.table == column.table) {
                    Some(index) => index,
                    None => {
                        records.push(Record::new(&column.table));
                        records.len() - 1
                    }
                };
                let record = &mut records[index];
                if field.is_id() {
                    record.id = value.as_i64();
                    if record.id.is_some() {
                        record.back_references = table.referenced_by().to_vec();
                    }
                }
                record.values.push((column.field.clone(), value));
            }

            rows.push(if records.len() == 1 {
                Row::Flat(records.remove(0))
            } else {
                Row::Nested(records)
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Row> {
        self.rows.get_mut(index)
    }

    /// Like [`Rows::get`], but an out-of-range index is an error.
    pub fn row(&self, index: usize) -> Result<&Row> {
        self.rows.get(index).ok_or(Error::RowIndexOutOfRange {
            index,
            len: self.rows.len(),
        })
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Render as CSV: a `table.field` header line, then one line per row.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(Vec::new());
        writer.write_record(self.columns.iter().map(|c| c.to_string()))?;
        for row in &self.rows {
            writer.write_record(self.columns.iter().map(|c| {
                row.get(&c.table, &c.field)
                    .map(Value::to_string)
                    .unwrap_or_default()
            }))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
