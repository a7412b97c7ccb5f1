//! Layered type resolution.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::trace;

use super::mapper::{PropertyKey, TypeMapper};
use super::DbType;
use crate::entity::PropertyDef;
use crate::value::ValueKind;

/// A single resolution step.
pub trait Resolver<I: ?Sized, O> {
    fn resolve(&self, input: &I) -> O;
}

/// A property together with the entity that declares it.
#[derive(Debug, Clone, Copy)]
pub struct PropertyRef<'a> {
    pub entity: &'a str,
    pub property: &'a PropertyDef,
}

/// Annotation, then property-level mapping, then type-level mapping.
#[derive(Debug, Clone)]
pub struct TypeMapResolver {
    mapper: Arc<TypeMapper>,
}

impl TypeMapResolver {
    pub fn new(mapper: Arc<TypeMapper>) -> Self {
        Self { mapper }
    }
}

impl<'a> Resolver<PropertyRef<'a>, Option<DbType>> for TypeMapResolver {
    fn resolve(&self, input: &PropertyRef<'a>) -> Option<DbType> {
        let property = input.property;
        if let Some(db_type) = property.db_type {
            trace!(entity = input.entity, property = %property.name, %db_type, "resolved from annotation");
            return Some(db_type);
        }
        let key = PropertyKey::new(input.entity, &property.name);
        if let Some(db_type) = self.mapper.property(&key) {
            trace!(%key, %db_type, "resolved from property mapping");
            return Some(db_type);
        }
        let resolved = self.mapper.kind(property.kind);
        if let Some(db_type) = resolved {
            trace!(%key, kind = ?property.kind, %db_type, "resolved from type mapping");
        }
        resolved
    }
}

impl Resolver<ValueKind, Option<DbType>> for TypeMapResolver {
    fn resolve(&self, input: &ValueKind) -> Option<DbType> {
        self.mapper.kind(*input)
    }
}

static GLOBAL: OnceCell<Arc<TypeResolutionChain>> = OnceCell::new();

/// Everything a property's resolution depends on. Two definitions that share
/// an entity name but differ in annotation or kind get separate entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    property: PropertyKey,
    annotation: Option<DbType>,
    kind: ValueKind,
}

/// The resolver plus a cache keyed by property identity.
///
/// Safe to share across threads. Cache fills are idempotent: two threads
/// resolving the same property compute the same result and either write wins.
#[derive(Debug)]
pub struct TypeResolutionChain {
    resolver: TypeMapResolver,
    mapper: Arc<TypeMapper>,
    cache: DashMap<CacheKey, Option<DbType>>,
}

impl TypeResolutionChain {
    pub fn new(mapper: TypeMapper) -> Self {
        let mapper = Arc::new(mapper);
        Self {
            resolver: TypeMapResolver::new(Arc::clone(&mapper)),
            mapper,
            cache: DashMap::new(),
        }
    }

    /// The process-wide chain. Starts with an empty mapping configuration
    /// unless one was installed first.
    pub fn global() -> Arc<TypeResolutionChain> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TypeResolutionChain::new(TypeMapper::new()))))
    }

    /// Install the process-wide chain. Fails, handing the chain back, when
    /// one is already in place.
    pub fn install_global(chain: TypeResolutionChain) -> Result<(), Arc<TypeResolutionChain>> {
        GLOBAL.set(Arc::new(chain))
    }

    /// Resolve the database type of a property, consulting the cache first.
    pub fn resolve(&self, entity: &str, property: &PropertyDef) -> Option<DbType> {
        let key = CacheKey {
            property: PropertyKey::new(entity, &property.name),
            annotation: property.db_type,
            kind: property.kind,
        };
        if let Some(hit) = self.cache.get(&key) {
            return *hit;
        }
        let resolved = self.resolver.resolve(&PropertyRef { entity, property });
        self.cache.insert(key, resolved);
        resolved
    }

    /// Type-level lookup for values with no declared property.
    pub fn resolve_kind(&self, kind: ValueKind) -> Option<DbType> {
        self.resolver.resolve(&kind)
    }

    pub fn mapper(&self) -> &TypeMapper {
        &self.mapper
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl Default for TypeResolutionChain {
    fn default() -> Self {
        Self::new(TypeMapper::new())
    }
}
