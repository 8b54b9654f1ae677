//! Table definitions.

use crate::catalog::Field;
use crate::error::{Error, Result};
use crate::expression::coerce;
use crate::set::Projection;
use crate::store::PropertyDef;
use crate::value::Value;

/// A `(table, field)` pair whose reference field points into another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackReference {
    pub table: String,
    pub field: String,
}

/// A defined table: ordered fields (id first), the tables referencing it,
/// and the entity schema registered with the store.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    fields: Vec<Field>,
    referenced_by: Vec<BackReference>,
    properties: Vec<PropertyDef>,
}

impl Table {
    pub(crate) fn new(name: String, fields: Vec<Field>, properties: Vec<PropertyDef>) -> Self {
        Self {
            name,
            fields,
            referenced_by: Vec::new(),
            properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name() == name)
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| Error::UnknownField {
                table: self.name.clone(),
                field: name.to_string(),
            })
    }

    /// The synthetic id field.
    pub fn id(&self) -> &Field {
        &self.fields[0]
    }

    pub fn referenced_by(&self) -> &[BackReference] {
        &self.referenced_by
    }

    pub(crate) fn add_back_reference(&mut self, table: &str, field: &str) {
        self.referenced_by.push(BackReference {
            table: table.to_string(),
            field: field.to_string(),
        });
    }

    /// Entity schema registered with the store for this table.
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    /// Projection of every column of this table.
    pub fn all(&self) -> Projection {
        Projection::All(self.name.clone())
    }

    /// Coerce assignments for a write, rejecting unknown fields and the id.
    pub(crate) fn coerce_values(&self, values: &[(&str, Value)]) -> Result<Vec<(String, Value)>> {
        values
            .iter()
            .map(|(name, value)| {
                let field = self.field(name)?;
                if field.is_id() {
                    return Err(Error::InvalidFieldName(format!(
                        "{}: ids are assigned by the store",
                        field.qualified_name()
                    )));
                }
                Ok((name.to_string(), coerce::represent(field, value.clone())?))
            })
            .collect()
    }
}
