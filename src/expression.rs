//! Query expression algebra.
//!
//! This module provides:
//! - Comparison predicates built from fields (`equals`, `less_than`, ...)
//! - Conjunction as the only boolean combinator
//! - Ordering expressions (`asc`, `desc`, `then`) and arithmetic terms
//! - Coercion of values into a field's semantic type

pub mod coerce;
pub mod order;
pub mod query;

pub use order::{Derived, OrderBy};
pub use query::{Operand, Predicate, Query};
