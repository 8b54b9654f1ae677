pub mod catalog;
pub mod database;
pub mod error;
pub mod expression;
pub mod rows;
pub mod set;
pub mod store;
pub mod value;

pub use catalog::{Field, FieldType, Table};
pub use database::Database;
pub use error::{Error, Result};
pub use rows::{Record, Row, Rows};
pub use set::{QuerySet, SelectOptions};
pub use value::Value;
