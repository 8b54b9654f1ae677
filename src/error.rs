//! Crate-level error type.
//!
//! Variants are grouped the way failures surface to callers: schema
//! definition, expression building, capability checks, and execution.
//! Every error is raised immediately; a by-id lookup that finds nothing is
//! not an error and yields an empty result instead.

use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Schema definition
    #[error("Invalid identifier '{0}': only [0-9a-zA-Z_] allowed in table and field names")]
    InvalidIdentifier(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid field name: {0}")]
    InvalidFieldName(String),

    #[error("Table '{0}' already defined")]
    DuplicateTable(String),

    #[error("Field '{field}' defined twice in table '{table}'")]
    DuplicateField { table: String, field: String },

    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("Reference to undefined table '{referenced}' from '{table}'")]
    UndefinedReference { table: String, referenced: String },

    #[error("Table '{table}' has the same name as a field in referenced table '{referenced}'")]
    ReferenceNameCollision { table: String, referenced: String },

    #[error("Table '{0}' does not exist")]
    UnknownTable(String),

    #[error("Field '{field}' does not exist in table '{table}'")]
    UnknownField { table: String, field: String },

    // Expression building
    #[error("Field '{field}' of type {field_type} cannot be filtered or ordered on")]
    NotFilterable { field: String, field_type: String },

    #[error("Comparison '{op}' on the id field is not supported")]
    UnsupportedIdComparison { op: String },

    #[error("Right side of a filter on '{field}' must be a value or entity, not a column")]
    ColumnOperand { field: String },

    #[error("Incompatible entity: expected kind '{expected}', got '{actual}'")]
    IncompatibleEntity { expected: String, actual: String },

    #[error("Select-by-id and all-rows expressions cannot be combined")]
    NotCombinable,

    #[error("Cannot coerce {value} into {field_type} for field '{field}'")]
    Coercion {
        field: String,
        field_type: String,
        value: String,
    },

    #[error("Invalid {kind} value: '{input}'")]
    InvalidTemporal { kind: &'static str, input: String },

    #[error("Validation failed for field '{field}': {message}")]
    Validation { field: String, message: String },

    // Capability
    #[error("No tables selected")]
    NoTableSelected,

    #[error("No join supported across tables: {0:?}")]
    MultipleTables(Vec<String>),

    #[error("Unsupported by the backing store: {0}")]
    Unsupported(String),

    #[error("Table '{table}' references '{referenced}' through several fields; name the field")]
    AmbiguousBackReference { table: String, referenced: String },

    // Execution
    #[error("Row index {index} out of range for {len} rows")]
    RowIndexOutOfRange { index: usize, len: usize },

    #[error("Row {id} of '{table}' no longer exists")]
    EntityNotFound { table: String, id: i64 },

    #[error("Malformed row: expected {expected} values, got {actual}")]
    MalformedRow { expected: usize, actual: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
