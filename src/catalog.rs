//! Schema catalog: the arena of table definitions owned by a database.
//!
//! Tables are stored once, in definition order, and looked up by name.
//! A table is validated completely before it is registered, so a failed
//! definition leaves the catalog untouched.

pub mod field;
pub mod table;
pub mod validator;

pub use field::{Field, FieldType, OnDelete};
pub use table::{BackReference, Table};
pub use validator::Validator;

use crate::error::{Error, Result};
use crate::store::PropertyDef;
use std::collections::HashMap;

/// Database attribute names a table may not shadow.
pub const RESERVED_TABLE_NAMES: &[&str] = &[
    "tables",
    "define_table",
    "get",
    "keys",
    "items",
    "values",
    "update",
    "copy",
    "clear",
    "pop",
];

/// Only `[0-9a-zA-Z_]` is allowed in table and field names.
pub fn check_identifier(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct Catalog {
    tables: Vec<Table>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.get(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Table names in definition order.
    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(Table::name).collect()
    }

    /// Validate a table definition without registering it.
    ///
    /// Prepends the id field, binds every field to the table, resolves
    /// reference targets and translates field types to store properties.
    pub fn prepare(&self, name: &str, fields: Vec<Field>) -> Result<Table> {
        check_identifier(name)?;
        if name.starts_with('_') || RESERVED_TABLE_NAMES.contains(&name) {
            return Err(Error::InvalidTableName(name.to_string()));
        }
        if self.contains(name) {
            return Err(Error::DuplicateTable(name.to_string()));
        }

        let mut all_fields = Vec::with_capacity(fields.len() + 1);
        all_fields.push(Field::id(name));
        for mut field in fields {
            if all_fields.iter().any(|f: &Field| f.name() == field.name()) {
                return Err(Error::DuplicateField {
                    table: name.to_string(),
                    field: field.name().to_string(),
                });
            }
            field.bind(name);
            all_fields.push(field);
        }

        let mut properties = Vec::with_capacity(all_fields.len() - 1);
        for field in all_fields.iter().skip(1) {
            if let Some(referenced) = field.field_type().referenced_table() {
                let target = self
                    .get(referenced)
                    .filter(|_| !referenced.is_empty())
                    .ok_or_else(|| Error::UndefinedReference {
                        table: name.to_string(),
                        referenced: referenced.to_string(),
                    })?;
                if target.has_field(name) {
                    return Err(Error::ReferenceNameCollision {
                        table: name.to_string(),
                        referenced: referenced.to_string(),
                    });
                }
            }
            let property_type = field
                .field_type()
                .property_type()
                .ok_or_else(|| Error::UnknownFieldType(field.field_type().to_string()))?;
            let required = field.is_notnull() && field.field_type().referenced_table().is_none();
            properties.push(PropertyDef::new(field.name(), property_type).required(required));
        }

        Ok(Table::new(name.to_string(), all_fields, properties))
    }

    /// Register a prepared table and record its back-references.
    pub fn register(&mut self, table: Table) -> &Table {
        let targets: Vec<(String, String)> = table
            .fields()
            .iter()
            .filter_map(|f| {
                f.field_type()
                    .referenced_table()
                    .map(|t| (t.to_string(), f.name().to_string()))
            })
            .collect();
        for (target, field) in targets {
            if let Some(&i) = self.by_name.get(&target) {
                self.tables[i].add_back_reference(table.name(), &field);
            }
        }

        let index = self.tables.len();
        self.by_name.insert(table.name().to_string(), index);
        self.tables.push(table);
        &self.tables[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PropertyType;
    use anyhow::Result;

    fn person_fields() -> Result<Vec<Field>> {
        Ok(vec![
            Field::new("name", FieldType::String)?.notnull(true),
            Field::new("birth", FieldType::Date)?,
        ])
    }

    #[test]
    fn test_prepare_prepends_id() -> Result<()> {
        let catalog = Catalog::new();
        let table = catalog.prepare("person", person_fields()?)?;
        assert_eq!(table.field_names(), vec!["id", "name", "birth"]);
        assert!(table.id().is_id());
        assert_eq!(table.field("name")?.table_name(), "person");
        assert_eq!(
            table.properties(),
            &[
                PropertyDef::new("name", PropertyType::String).required(true),
                PropertyDef::new("birth", PropertyType::Date),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_table_name_rules() -> Result<()> {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.prepare("my table", vec![]),
            Err(Error::InvalidIdentifier(_))
        ));
        assert!(matches!(
            catalog.prepare("_private", vec![]),
            Err(Error::InvalidTableName(_))
        ));
        assert!(matches!(
            catalog.prepare("tables", vec![]),
            Err(Error::InvalidTableName(_))
        ));
        assert!(matches!(
            catalog.prepare("", vec![]),
            Err(Error::InvalidIdentifier(_))
        ));
        for name in ["get", "keys", "items", "values", "update", "copy", "clear", "pop"] {
            assert!(
                matches!(catalog.prepare(name, vec![]), Err(Error::InvalidTableName(_))),
                "{} should be reserved",
                name
            );
        }
        assert!(catalog.prepare("lastsql", vec![]).is_ok());
        Ok(())
    }

    #[test]
    fn test_field_metadata_survives_definition() -> Result<()> {
        let mut catalog = Catalog::new();
        let person = catalog.prepare("person", person_fields()?)?;
        let person = catalog.register(person).clone();

        let dog = catalog.prepare(
            "dog",
            vec![
                Field::new("tag", FieldType::String)?.required(true).unique(true),
                Field::reference("owner", &person)?.ondelete(OnDelete::SetNull),
            ],
        )?;
        let dog = catalog.register(dog);

        let tag = dog.field("tag")?;
        assert!(tag.is_required());
        assert!(tag.is_unique());
        assert!(!tag.is_notnull());
        assert_eq!(tag.on_delete(), OnDelete::Cascade);

        let owner = dog.field("owner")?;
        assert_eq!(owner.on_delete(), OnDelete::SetNull);
        assert!(!owner.is_required());
        assert!(!owner.is_unique());

        // unique and required alone do not make the store property required
        assert!(dog.properties().iter().all(|p| !p.required));
        Ok(())
    }

    #[test]
    fn test_duplicate_table_and_field() -> Result<()> {
        let mut catalog = Catalog::new();
        let table = catalog.prepare("person", person_fields()?)?;
        catalog.register(table);

        assert!(matches!(
            catalog.prepare("person", vec![]),
            Err(Error::DuplicateTable(_))
        ));
        assert!(matches!(
            catalog.prepare(
                "pet",
                vec![
                    Field::new("name", FieldType::String)?,
                    Field::new("name", FieldType::Integer)?
                ]
            ),
            Err(Error::DuplicateField { .. })
        ));
        assert!(matches!(
            catalog.prepare("pet", vec![Field::new("id", FieldType::Integer)?]),
            Err(Error::DuplicateField { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_references_resolve_and_register_back_references() -> Result<()> {
        let mut catalog = Catalog::new();
        let person = catalog.prepare("person", person_fields()?)?;
        let person = catalog.register(person).clone();

        assert!(matches!(
            catalog.prepare("dog", vec![Field::parse("owner", "reference cat")?]),
            Err(Error::UndefinedReference { .. })
        ));
        assert!(matches!(
            catalog.prepare("dog", vec![Field::parse("owner", "reference")?]),
            Err(Error::UndefinedReference { .. })
        ));

        let dog = catalog.prepare("dog", vec![Field::reference("owner", &person)?])?;
        assert_eq!(
            dog.properties()[0].property_type,
            PropertyType::Reference("person".into())
        );
        assert!(catalog.table("person")?.referenced_by().is_empty());

        catalog.register(dog);
        assert_eq!(
            catalog.table("person")?.referenced_by(),
            &[BackReference {
                table: "dog".into(),
                field: "owner".into()
            }]
        );
        assert_eq!(catalog.names(), vec!["person", "dog"]);
        Ok(())
    }

    #[test]
    fn test_reference_name_collision() -> Result<()> {
        let mut catalog = Catalog::new();
        let person = catalog.prepare(
            "person",
            vec![Field::new("name", FieldType::String)?, Field::new("dog", FieldType::String)?],
        )?;
        let person = catalog.register(person).clone();

        assert!(matches!(
            catalog.prepare("dog", vec![Field::reference("owner", &person)?]),
            Err(Error::ReferenceNameCollision { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_self_reference_is_a_forward_reference() -> Result<()> {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.prepare("node", vec![Field::parse("parent", "reference node")?]),
            Err(Error::UndefinedReference { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_user_id_typed_field_is_untranslatable() -> Result<()> {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.prepare("thing", vec![Field::parse("other", "id")?]),
            Err(Error::UnknownFieldType(_))
        ));
        Ok(())
    }
}
