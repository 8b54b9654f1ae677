//! Ordering expressions.
//!
//! An ordering serializes to a pipe-delimited list of field names; a
//! leading `-` marks a descending component, e.g. `-total|created_at`.

use crate::catalog::Field;
use crate::error::{Error, Result};
use std::fmt;
use std::ops::BitOr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    serialized: String,
}

impl OrderBy {
    /// Wrap an already serialized ordering.
    pub fn parse(serialized: impl Into<String>) -> Self {
        Self { serialized: serialized.into() }
    }

    /// Order by `self`, then by `other` (the `|` operator).
    pub fn then(self, other: OrderBy) -> OrderBy {
        OrderBy {
            serialized: format!("{}|{}", self.serialized, other.serialized),
        }
    }

    /// `(name, descending)` for each component.
    pub fn components(&self) -> impl Iterator<Item = (&str, bool)> {
        self.serialized.split('|').map(|part| match part.strip_prefix('-') {
            Some(name) => (name, true),
            None => (part, false),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.serialized
    }
}

impl BitOr for OrderBy {
    type Output = OrderBy;

    fn bitor(self, rhs: OrderBy) -> OrderBy {
        self.then(rhs)
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized)
    }
}

/// Arithmetic over columns. Float-typed and usable only for ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derived {
    name: String,
}

impl Derived {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plus(&self, other: impl fmt::Display) -> Derived {
        Derived {
            name: format!("{}+{}", self.name, other),
        }
    }

    pub fn minus(&self, other: impl fmt::Display) -> Derived {
        Derived {
            name: format!("{}-{}", self.name, other),
        }
    }

    pub fn times(&self, other: impl fmt::Display) -> Derived {
        Derived {
            name: format!("{}*{}", self.name, other),
        }
    }

    pub fn divided_by(&self, other: impl fmt::Display) -> Derived {
        Derived {
            name: format!("{}/{}", self.name, other),
        }
    }

    pub fn asc(&self) -> OrderBy {
        OrderBy::parse(self.name.clone())
    }

    pub fn desc(&self) -> OrderBy {
        OrderBy::parse(format!("-{}", self.name))
    }
}

impl fmt::Display for Derived {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Field {
    fn check_orderable(&self) -> Result<()> {
        if !self.field_type().is_filterable() {
            return Err(Error::NotFilterable {
                field: self.qualified_name(),
                field_type: self.field_type().to_string(),
            });
        }
        Ok(())
    }

    /// Ascending order on this field.
    pub fn asc(&self) -> Result<OrderBy> {
        self.check_orderable()?;
        Ok(OrderBy::parse(self.name()))
    }

    /// Descending order on this field (the `~` operator).
    pub fn desc(&self) -> Result<OrderBy> {
        self.check_orderable()?;
        Ok(OrderBy::parse(format!("-{}", self.name())))
    }

    pub fn plus(&self, other: impl fmt::Display) -> Derived {
        Derived {
            name: format!("{}+{}", self, other),
        }
    }

    pub fn minus(&self, other: impl fmt::Display) -> Derived {
        Derived {
            name: format!("{}-{}", self, other),
        }
    }

    pub fn times(&self, other: impl fmt::Display) -> Derived {
        Derived {
            name: format!("{}*{}", self, other),
        }
    }

    pub fn divided_by(&self, other: impl fmt::Display) -> Derived {
        Derived {
            name: format!("{}/{}", self, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, FieldType};
    use anyhow::Result;

    fn catalog() -> Result<Catalog> {
        let mut catalog = Catalog::new();
        let posts = catalog.prepare(
            "posts",
            vec![
                Field::new("body", FieldType::Text)?,
                Field::new("total", FieldType::Integer)?,
                Field::new("created_at", FieldType::DateTime)?,
            ],
        )?;
        catalog.register(posts);
        Ok(catalog)
    }

    #[test]
    fn test_order_serialization() -> Result<()> {
        let catalog = catalog()?;
        let posts = catalog.table("posts")?;
        let order = posts.field("total")?.desc()? | posts.field("created_at")?.asc()?;
        assert_eq!(order.to_string(), "-total|created_at");
        assert_eq!(
            order.components().collect::<Vec<_>>(),
            vec![("total", true), ("created_at", false)]
        );
        Ok(())
    }

    #[test]
    fn test_text_fields_not_orderable() -> Result<()> {
        let catalog = catalog()?;
        let body = catalog.table("posts")?.field("body")?;
        assert!(matches!(body.asc(), Err(Error::NotFilterable { .. })));
        assert!(matches!(body.desc(), Err(Error::NotFilterable { .. })));
        Ok(())
    }

    #[test]
    fn test_derived_terms() -> Result<()> {
        let catalog = catalog()?;
        let posts = catalog.table("posts")?;
        let total = posts.field("total")?;
        let derived = total.plus(posts.id()).times(2);
        assert_eq!(derived.name(), "posts.total+posts.id*2");
        assert_eq!(derived.desc().to_string(), "-posts.total+posts.id*2");
        assert_eq!(total.minus(1).divided_by(3).asc().as_str(), "posts.total-1/3");
        Ok(())
    }
}
