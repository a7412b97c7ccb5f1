//! Entity metadata and row materialization.
//!
//! An [`EntityDefinition`] is the explicitly declared shape of a mapped
//! record: its table, its properties, the column each property maps to,
//! optional per-property database type annotations, and which properties
//! form the primary key / identity. It replaces runtime reflection: nothing in
//! the crate inspects a Rust type's fields.

use std::fmt;

use inflector::Inflector;

use crate::filter::{Field, FieldCase};
use crate::types::DbType;
use crate::value::{Record, ValueKind};

/// Errors raised while materializing rows into typed records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("column '{0}' is missing from the result row")]
    MissingColumn(String),

    #[error("column '{column}' holds {found}, which cannot be read as {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: String,
    },
}

/// A possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Parse `schema.table` or `table`.
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, name)) => Self::new(name).with_schema(schema),
            None => Self::new(qualified),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Convention deriving a column name from a property name when no explicit
/// column mapping is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Naming {
    #[default]
    AsIs,
    SnakeCase,
}

impl Naming {
    pub fn apply(self, name: &str) -> String {
        match self {
            Naming::AsIs => name.to_string(),
            Naming::SnakeCase => name.to_snake_case(),
        }
    }
}

/// A mapped property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    column: Option<String>,
    pub kind: ValueKind,
    /// Explicit per-property database type annotation. Highest precedence in
    /// type resolution.
    pub db_type: Option<DbType>,
    pub primary: bool,
    pub identity: bool,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            column: None,
            kind,
            db_type: None,
            primary: false,
            identity: false,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// The database column this property maps to.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub fn field(&self) -> Field {
        Field::with_kind(self.column_name(), self.kind)
    }
}

/// Declared shape of a mapped entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDefinition {
    name: String,
    table: TableName,
    properties: Vec<PropertyDef>,
}

impl EntityDefinition {
    pub fn builder(name: impl Into<String>) -> EntityBuilder {
        EntityBuilder::new(name)
    }

    /// A property-less definition addressing a table by name, for dynamic
    /// records. Selects `*` and relies on connection metadata for keys.
    pub fn table_only(table: TableName) -> Self {
        Self {
            name: table.name.clone(),
            table,
            properties: Vec::new(),
        }
    }

    /// Declaring type name; the first half of every property identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn is_dynamic(&self) -> bool {
        self.properties.is_empty()
    }

    /// Find a property by property name or mapped column name.
    pub fn property(&self, name: &str, case: FieldCase) -> Option<&PropertyDef> {
        self.properties
            .iter()
            .find(|p| case.matches(&p.name, name))
            .or_else(|| {
                self.properties
                    .iter()
                    .find(|p| case.matches(p.column_name(), name))
            })
    }

    pub fn identity(&self) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.identity)
    }

    /// Match-on fields used when an upsert has no explicit qualifiers:
    /// the primary key properties, or the identity when no primary is declared.
    pub fn key_properties(&self) -> Vec<&PropertyDef> {
        let primary: Vec<_> = self.properties.iter().filter(|p| p.primary).collect();
        if !primary.is_empty() {
            return primary;
        }
        self.identity().into_iter().collect()
    }

    /// All mapped columns in declaration order.
    pub fn fields(&self) -> Vec<Field> {
        self.properties.iter().map(PropertyDef::field).collect()
    }
}

/// Builder for [`EntityDefinition`].
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until build() is called"]
pub struct EntityBuilder {
    name: String,
    table: Option<TableName>,
    naming: Naming,
    properties: Vec<PropertyDef>,
}

impl EntityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            naming: Naming::AsIs,
            properties: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(TableName::new(table));
        self
    }

    pub fn qualified_table(mut self, table: TableName) -> Self {
        self.table = Some(table);
        self
    }

    pub fn naming(mut self, naming: Naming) -> Self {
        self.naming = naming;
        self
    }

    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    pub fn build(self) -> EntityDefinition {
        let naming = self.naming;
        let table = self
            .table
            .unwrap_or_else(|| TableName::new(naming.apply(&self.name)));
        let properties = self
            .properties
            .into_iter()
            .map(|p| match p.column {
                Some(_) => p,
                None => {
                    let column = naming.apply(&p.name);
                    p.column(column)
                }
            })
            .collect();
        EntityDefinition {
            name: self.name,
            table,
            properties,
        }
    }
}

/// Converts a result row into a typed value.
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> Result<Self, MappingError>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> Result<Self, MappingError> {
        Ok(record.clone())
    }
}

/// A statically mapped record type.
pub trait Entity: FromRecord {
    fn definition() -> &'static EntityDefinition;

    /// Property values keyed by column name, in declaration order.
    fn to_record(&self) -> Record;
}
