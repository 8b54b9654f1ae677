//! Field definitions and semantic field types.

use crate::catalog::{check_identifier, Table, Validator};
use crate::error::{Error, Result};
use crate::store::PropertyType;
use crate::value::Value;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Attribute names of a table that a field may not shadow.
pub const RESERVED_FIELD_NAMES: &[&str] = &[
    "fields",
    "insert",
    "drop",
    "create",
    "ALL",
    "update_record",
    "get",
    "keys",
    "items",
    "values",
    "update",
    "copy",
    "clear",
    "pop",
];

/// Length given to string fields when none is specified.
pub const DEFAULT_STRING_LENGTH: usize = 32;
/// Length given to password fields declared without one.
pub const DEFAULT_PASSWORD_LENGTH: usize = 32;
pub const UPLOAD_LENGTH: usize = 64;

/// Semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    String,
    Text,
    Blob,
    Password,
    Upload,
    Integer,
    Double,
    Date,
    Time,
    DateTime,
    /// Reference to a row of the named table
    Reference(String),
    /// The synthetic row id
    Id,
}

impl FieldType {
    /// Native store type for this field, or `None` when the type has no
    /// stored representation.
    pub fn property_type(&self) -> Option<PropertyType> {
        match self {
            FieldType::Boolean => Some(PropertyType::Boolean),
            FieldType::String | FieldType::Password | FieldType::Upload => {
                Some(PropertyType::String)
            }
            FieldType::Text => Some(PropertyType::Text),
            FieldType::Blob => Some(PropertyType::Blob),
            FieldType::Integer => Some(PropertyType::Integer),
            FieldType::Double => Some(PropertyType::Float),
            FieldType::Date => Some(PropertyType::Date),
            FieldType::Time => Some(PropertyType::Time),
            FieldType::DateTime => Some(PropertyType::DateTime),
            FieldType::Reference(table) => Some(PropertyType::Reference(table.clone())),
            FieldType::Id => None,
        }
    }

    /// Whether the store can filter and order on this type.
    pub fn is_filterable(&self) -> bool {
        !matches!(self, FieldType::Text | FieldType::Blob)
    }

    pub fn referenced_table(&self) -> Option<&str> {
        match self {
            FieldType::Reference(table) => Some(table),
            _ => None,
        }
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("reference") {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return Ok(FieldType::Reference(rest.trim().to_string()));
            }
        }
        match s {
            "boolean" => Ok(FieldType::Boolean),
            "string" => Ok(FieldType::String),
            "text" => Ok(FieldType::Text),
            "blob" => Ok(FieldType::Blob),
            "password" => Ok(FieldType::Password),
            "upload" => Ok(FieldType::Upload),
            "integer" => Ok(FieldType::Integer),
            "double" => Ok(FieldType::Double),
            "date" => Ok(FieldType::Date),
            "time" => Ok(FieldType::Time),
            "datetime" => Ok(FieldType::DateTime),
            "id" => Ok(FieldType::Id),
            other => Err(Error::UnknownFieldType(other.to_string())),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::String => f.write_str("string"),
            FieldType::Text => f.write_str("text"),
            FieldType::Blob => f.write_str("blob"),
            FieldType::Password => f.write_str("password"),
            FieldType::Upload => f.write_str("upload"),
            FieldType::Integer => f.write_str("integer"),
            FieldType::Double => f.write_str("double"),
            FieldType::Date => f.write_str("date"),
            FieldType::Time => f.write_str("time"),
            FieldType::DateTime => f.write_str("datetime"),
            FieldType::Reference(table) => write!(f, "reference {}", table),
            FieldType::Id => f.write_str("id"),
        }
    }
}

/// What happens to referencing rows when the referenced row is deleted.
///
/// Carried as metadata; the store has no way to enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDelete {
    #[default]
    Cascade,
    SetNull,
    NoAction,
}

/// A typed column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    /// Owning table, set when the table is defined
    table: String,
    declared_type: FieldType,
    declared_length: Option<usize>,
    field_type: FieldType,
    length: Option<usize>,
    default: Option<Value>,
    required: bool,
    notnull: bool,
    unique: bool,
    ondelete: OnDelete,
    requires: Option<Vec<Validator>>,
}

impl Field {
    /// Create a field. String fields get a default length of 32.
    pub fn new(name: &str, field_type: FieldType) -> Result<Self> {
        check_identifier(name)?;
        if name.starts_with('_') || RESERVED_FIELD_NAMES.contains(&name) {
            return Err(Error::InvalidFieldName(name.to_string()));
        }
        let mut field = Self {
            name: name.to_string(),
            table: String::new(),
            declared_type: field_type.clone(),
            declared_length: Some(DEFAULT_STRING_LENGTH),
            field_type,
            length: None,
            default: None,
            required: false,
            notnull: false,
            unique: false,
            ondelete: OnDelete::default(),
            requires: None,
        };
        field.normalize();
        Ok(field)
    }

    /// Create a field from a textual type name such as `"date"` or
    /// `"reference person"`.
    pub fn parse(name: &str, type_name: &str) -> Result<Self> {
        Self::new(name, type_name.parse()?)
    }

    /// Create a reference to rows of `table`.
    pub fn reference(name: &str, table: &Table) -> Result<Self> {
        Self::new(name, FieldType::Reference(table.name().to_string()))
    }

    pub(crate) fn id(table: &str) -> Self {
        Self {
            name: "id".to_string(),
            table: table.to_string(),
            declared_type: FieldType::Id,
            declared_length: None,
            field_type: FieldType::Id,
            length: None,
            default: None,
            required: false,
            notnull: false,
            unique: false,
            ondelete: OnDelete::default(),
            requires: None,
        }
    }

    fn normalize(&mut self) {
        self.field_type = self.declared_type.clone();
        self.length = self.declared_length;
        match (&self.declared_type, self.declared_length) {
            (FieldType::String, None) => self.field_type = FieldType::Text,
            (FieldType::Password, None) => self.length = Some(DEFAULT_PASSWORD_LENGTH),
            (FieldType::Upload, _) => self.length = Some(UPLOAD_LENGTH),
            _ => {}
        }
    }

    /// Set the length bound. `None` turns a string field into a text field.
    pub fn length(mut self, length: impl Into<Option<usize>>) -> Self {
        self.declared_length = length.into();
        self.normalize();
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn notnull(mut self, notnull: bool) -> Self {
        self.notnull = notnull;
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn ondelete(mut self, ondelete: OnDelete) -> Self {
        self.ondelete = ondelete;
        self
    }

    /// Replace the default validators. An empty list disables validation.
    pub fn requires(mut self, validators: Vec<Validator>) -> Self {
        self.requires = Some(validators);
        self
    }

    pub(crate) fn bind(&mut self, table: &str) {
        self.table = table.to_string();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn max_length(&self) -> Option<usize> {
        self.length
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_notnull(&self) -> bool {
        self.notnull
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn on_delete(&self) -> OnDelete {
        self.ondelete
    }

    pub fn is_id(&self) -> bool {
        self.field_type == FieldType::Id
    }

    /// Validators in effect: explicit ones, or the defaults for the type.
    pub fn validators(&self) -> Cow<'_, [Validator]> {
        match &self.requires {
            Some(validators) => Cow::Borrowed(validators),
            None => Cow::Owned(Validator::defaults(&self.field_type, self.length)),
        }
    }

    /// Run every validator in order, returning the normalized value.
    pub fn validate(&self, value: &Value) -> Result<Value> {
        self.validators()
            .iter()
            .try_fold(value.clone(), |value, validator| validator.validate(&value))
            .map_err(|message| Error::Validation {
                field: self.name.clone(),
                message,
            })
    }

    /// Format a value for output using the validators' formatters, applied
    /// in reverse order.
    pub fn formatter(&self, value: Value) -> Value {
        if value.is_null() {
            return value;
        }
        self.validators()
            .iter()
            .rev()
            .filter(|v| v.has_formatter())
            .fold(value, |value, validator| validator.format(value))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}
