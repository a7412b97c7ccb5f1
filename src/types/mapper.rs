//! Mapping configuration store.

use std::collections::HashMap;
use std::fmt;

use super::DbType;
use crate::value::ValueKind;

/// Identity of a property: declaring entity name plus property name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    pub entity: String,
    pub property: String,
}

impl PropertyKey {
    pub fn new(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            property: property.into(),
        }
    }

    /// Parse `Entity.Property`.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (entity, property) = qualified.rsplit_once('.')?;
        if entity.is_empty() || property.is_empty() {
            return None;
        }
        Some(Self::new(entity, property))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.property)
    }
}

/// Registered property-level and type-level mappings.
///
/// Configured once at startup; the resolution chain treats it as read-only.
#[derive(Debug, Clone, Default)]
pub struct TypeMapper {
    properties: HashMap<PropertyKey, DbType>,
    kinds: HashMap<ValueKind, DbType>,
}

impl TypeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property-level mapping, replacing any previous one.
    pub fn map_property(&mut self, key: PropertyKey, db_type: DbType) -> &mut Self {
        self.properties.insert(key, db_type);
        self
    }

    /// Register a type-level mapping, replacing any previous one.
    pub fn map_kind(&mut self, kind: ValueKind, db_type: DbType) -> &mut Self {
        self.kinds.insert(kind, db_type);
        self
    }

    pub fn unmap_property(&mut self, key: &PropertyKey) -> Option<DbType> {
        self.properties.remove(key)
    }

    pub fn unmap_kind(&mut self, kind: ValueKind) -> Option<DbType> {
        self.kinds.remove(&kind)
    }

    pub fn property(&self, key: &PropertyKey) -> Option<DbType> {
        self.properties.get(key).copied()
    }

    pub fn kind(&self, kind: ValueKind) -> Option<DbType> {
        self.kinds.get(&kind).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.kinds.is_empty()
    }
}
