//! Backing store error types.

use crate::store::PropertyType;
use thiserror::Error;

/// Errors raised by an entity store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Kind not found: {0}")]
    KindNotFound(String),

    #[error("Unknown property '{property}' on kind {kind}")]
    UnknownProperty { kind: String, property: String },

    #[error("Property {kind}.{property} expects {expected:?}, got {actual}")]
    TypeMismatch {
        kind: String,
        property: String,
        expected: PropertyType,
        actual: &'static str,
    },

    #[error("Property {kind}.{property} is required")]
    RequiredProperty { kind: String, property: String },

    #[error("Property {kind}.{property} is not indexed and cannot be filtered or ordered on")]
    NotIndexed { kind: String, property: String },

    #[error("Key of kind {actual} used with kind {expected}")]
    KindMismatch { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
