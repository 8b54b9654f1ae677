use crate::catalog::{Catalog, Field, Table};
use crate::error::Result;
use crate::expression::{coerce, Query};
use crate::set::QuerySet;
use crate::store::{Entity, EntityStore, MemoryStore};
use crate::value::Value;
use log::{debug, info};
use std::sync::Arc;

/// Schema registry bound to a backing entity store.
///
/// Owns the table definitions; rows live in the store. The registry is an
/// in-process value: definitions are not persisted and must be repeated
/// after reopening a store.
pub struct Database {
    store: Arc<dyn EntityStore>,
    catalog: Catalog,
}

impl Database {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            catalog: Catalog::new(),
        }
    }

    /// Registry over a fresh, empty [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Define a table and register its kind with the store.
    ///
    /// The definition is validated in full first; on error nothing is
    /// registered.
    pub fn define_table(&mut self, name: &str, fields: Vec<Field>) -> Result<&Table> {
        let table = self.catalog.prepare(name, fields)?;
        self.store.create_kind(table.name(), table.properties())?;
        info!(
            "Defined table {} ({})",
            table.name(),
            table.field_names().join(", ")
        );
        Ok(self.catalog.register(table))
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.catalog.table(name)
    }

    /// Table names in definition order.
    pub fn tables(&self) -> Vec<&str> {
        self.catalog.names()
    }

    /// The set of rows matching `query`.
    pub fn set(&self, query: Query) -> Result<QuerySet<'_>> {
        QuerySet::new(self, Some(query))
    }

    /// A set with no query; its table comes from the select projection.
    pub fn unfiltered(&self) -> QuerySet<'_> {
        QuerySet::unfiltered(self)
    }

    /// Insert a row and return its id.
    ///
    /// Missing fields take their default, if any. Values are coerced the
    /// same way filter operands are.
    pub fn insert(&self, table: &str, values: &[(&str, Value)]) -> Result<i64> {
        let table = self.table(table)?;
        let assignments = table.coerce_values(values)?;

        let mut entity = Entity::new(table.name());
        for field in table.fields().iter().skip(1) {
            if assignments.iter().any(|(name, _)| name == field.name()) {
                continue;
            }
            if let Some(default) = field.default() {
                entity.set(field.name(), coerce::represent(field, default.clone())?);
            }
        }
        for (name, value) in assignments {
            entity.set(name, value);
        }

        let key = self.store.put(entity)?;
        debug!("insert {}", key);
        Ok(key.id)
    }

    /// Delete every row of `table`. The definition stays registered.
    pub fn drop_rows(&self, table: &str) -> Result<usize> {
        let query = self.table(table)?.id().greater_than(0)?;
        self.set(query)?.delete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;
    use crate::error::Error;
    use crate::set::SelectOptions;
    use anyhow::Result;
    use chrono::NaiveDate;

    fn people() -> Result<Database> {
        let mut db = Database::in_memory();
        db.define_table(
            "person",
            vec![
                Field::new("name", FieldType::String)?.notnull(true),
                Field::new("birth", FieldType::Date)?,
                Field::new("alive", FieldType::Boolean)?.default_value(true),
            ],
        )?;
        db.define_table(
            "dog",
            vec![
                Field::new("name", FieldType::String)?,
                Field::parse("owner", "reference person")?,
            ],
        )?;
        Ok(db)
    }

    #[test]
    fn test_define_table() -> Result<()> {
        let db = people()?;
        assert_eq!(db.tables(), vec!["person", "dog"]);
        assert_eq!(
            db.table("person")?.field_names(),
            vec!["id", "name", "birth", "alive"]
        );
        assert_eq!(db.table("person")?.referenced_by().len(), 1);
        assert!(matches!(db.table("cat"), Err(Error::UnknownTable(_))));
        Ok(())
    }

    #[test]
    fn test_failed_definition_registers_nothing() -> Result<()> {
        let mut db = people()?;
        let result = db.define_table(
            "cat",
            vec![
                Field::new("name", FieldType::String)?,
                Field::new("name", FieldType::Integer)?,
            ],
        );
        assert!(matches!(result, Err(Error::DuplicateField { .. })));
        assert!(matches!(db.table("cat"), Err(Error::UnknownTable(_))));

        assert!(matches!(
            db.define_table("person", Vec::new()),
            Err(Error::DuplicateTable(_))
        ));
        assert!(matches!(
            db.define_table("tables", Vec::new()),
            Err(Error::InvalidTableName(_))
        ));
        assert_eq!(db.tables().len(), 2);
        Ok(())
    }

    #[test]
    fn test_insert_applies_defaults_and_coercion() -> Result<()> {
        let db = people()?;
        let max = db.insert(
            "person",
            &[("name", Value::from("Max")), ("birth", Value::from("1971-12-21"))],
        )?;
        assert_eq!(max, 1);
        let rex = db.insert("dog", &[("name", Value::from("Rex")), ("owner", Value::from(max))])?;

        let rows = db.set(db.table("person")?.id().equals(max)?)?.select(&SelectOptions::new())?;
        let person = rows.row(0)?.record().expect("flat row");
        assert_eq!(person.get_bool("alive"), Some(true));
        assert_eq!(person.get_date("birth"), NaiveDate::from_ymd_opt(1971, 12, 21));

        let rows = db.set(db.table("dog")?.id().equals(rex)?)?.select(&SelectOptions::new())?;
        assert_eq!(rows.row(0)?.get("dog", "owner"), Some(&Value::Integer(max)));
        Ok(())
    }

    #[test]
    fn test_insert_rejects_bad_fields() -> Result<()> {
        let db = people()?;
        assert!(matches!(
            db.insert("person", &[("id", Value::from(3)), ("name", Value::from("x"))]),
            Err(Error::InvalidFieldName(_))
        ));
        assert!(matches!(
            db.insert("person", &[("nickname", Value::from("x"))]),
            Err(Error::UnknownField { .. })
        ));
        assert!(matches!(
            db.insert("person", &[("birth", Value::from("2001-01-01"))]),
            Err(Error::Store(_))
        ));
        assert!(matches!(
            db.insert("dog", &[("owner", Value::from("Max"))]),
            Err(Error::Coercion { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_drop_rows() -> Result<()> {
        let db = people()?;
        for name in ["Ann", "Bob", "Cid"] {
            db.insert("person", &[("name", Value::from(name))])?;
        }
        assert_eq!(db.drop_rows("person")?, 3);
        assert_eq!(db.set(db.table("person")?.id().greater_than(0)?)?.count()?, 0);
        assert!(db.table("person").is_ok());
        Ok(())
    }
}
