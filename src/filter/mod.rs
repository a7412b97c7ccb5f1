//! Filters and their normalization.
//!
//! Callers may express a WHERE condition in several shapes: a dynamic record
//! of `name => value` pairs, a single [`QueryField`], a list of them, an
//! explicit [`QueryGroup`], a [`Predicate`] over entity properties, or a bare
//! primary-key value. [`normalize`] turns every shape into one canonical
//! [`QueryGroup`] so the statement builder only ever sees one form.

mod condition;
mod field;
mod order;
mod predicate;

pub use condition::{
    escape_like, ConditionNode, Conjunction, Operator, QueryField, QueryGroup, LIKE_ESCAPE,
};
pub use field::{Field, FieldCase};
pub use order::{Direction, OrderField};
pub use predicate::{constant, not, prop, CompareOp, Predicate, PredicateExt};

use serde::Deserialize;
use tracing::trace;

use crate::entity::EntityDefinition;
use crate::error::{QueryError, QueryResult};
use crate::value::{Record, Value};
use predicate::PredicateCompiler;

/// Any accepted filter shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equality per member (membership when the member holds a list),
    /// AND-combined.
    Dynamic(Record),
    Condition(QueryField),
    /// AND-combined conditions.
    Conditions(Vec<QueryField>),
    Group(QueryGroup),
    Predicate(Predicate),
    /// Equality against the entity's single primary key.
    PrimaryKey(Value),
}

impl Filter {
    /// Filter on the primary key.
    pub fn key(value: impl Into<Value>) -> Self {
        Filter::PrimaryKey(value.into())
    }

    /// Build a filter from JSON.
    ///
    /// * an object is a dynamic filter: `{"Id": 5, "Name": ["a", "b"]}`
    /// * an array is a list of conditions:
    ///   `[{"field": "Id", "operator": "gt", "value": 5}]`
    /// * a scalar is a primary-key value
    pub fn from_json(json: &serde_json::Value) -> QueryResult<Self> {
        match json {
            serde_json::Value::Object(members) => {
                let mut record = Record::with_capacity(members.len());
                for (name, value) in members {
                    let value = Value::from_json(value).ok_or_else(|| {
                        QueryError::UnsupportedFilterShape(format!(
                            "member '{}' holds a nested object",
                            name
                        ))
                    })?;
                    record.push(name.as_str(), value);
                }
                Ok(Filter::Dynamic(record))
            }
            serde_json::Value::Array(items) => items
                .iter()
                .map(condition_from_json)
                .collect::<QueryResult<Vec<_>>>()
                .map(Filter::Conditions),
            serde_json::Value::Null => Err(QueryError::UnsupportedFilterShape(
                "null is not a filter".to_string(),
            )),
            scalar => Value::from_json(scalar)
                .map(Filter::PrimaryKey)
                .ok_or_else(|| QueryError::UnsupportedFilterShape(scalar.to_string())),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Filter::Dynamic(_) => "dynamic",
            Filter::Condition(_) => "condition",
            Filter::Conditions(_) => "conditions",
            Filter::Group(_) => "group",
            Filter::Predicate(_) => "predicate",
            Filter::PrimaryKey(_) => "primary_key",
        }
    }
}

#[derive(Deserialize)]
struct RawCondition {
    field: String,
    #[serde(default)]
    operator: Option<Operator>,
    #[serde(default)]
    value: serde_json::Value,
}

fn condition_from_json(json: &serde_json::Value) -> QueryResult<QueryField> {
    let raw = RawCondition::deserialize(json)
        .map_err(|e| QueryError::UnsupportedFilterShape(format!("condition {}: {}", json, e)))?;
    let value = Value::from_json(&raw.value).ok_or_else(|| {
        QueryError::UnsupportedFilterShape(format!("value of '{}' is an object", raw.field))
    })?;
    Ok(QueryField::new(
        raw.field,
        raw.operator.unwrap_or(Operator::Equal),
        value,
    ))
}

impl From<Record> for Filter {
    fn from(record: Record) -> Self {
        Filter::Dynamic(record)
    }
}

impl From<QueryField> for Filter {
    fn from(field: QueryField) -> Self {
        Filter::Condition(field)
    }
}

impl From<Vec<QueryField>> for Filter {
    fn from(fields: Vec<QueryField>) -> Self {
        Filter::Conditions(fields)
    }
}

impl From<QueryGroup> for Filter {
    fn from(group: QueryGroup) -> Self {
        Filter::Group(group)
    }
}

impl From<Predicate> for Filter {
    fn from(predicate: Predicate) -> Self {
        Filter::Predicate(predicate)
    }
}

/// Canonicalizes filters against an entity definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    case: FieldCase,
}

impl Normalizer {
    pub fn new(case: FieldCase) -> Self {
        Self { case }
    }

    /// Normalize `filter` to a validated group.
    ///
    /// Field names in dynamic records and conditions are not checked against
    /// the entity; names that match no property are emitted verbatim.
    pub fn normalize(&self, filter: Filter, entity: &EntityDefinition) -> QueryResult<QueryGroup> {
        trace!(shape = filter.shape(), entity = entity.name(), "normalizing filter");
        let group = match filter {
            Filter::Dynamic(record) => QueryGroup::and(record.into_iter().map(|(name, value)| {
                match value {
                    Value::List(_) => QueryField::new(name, Operator::In, value),
                    value => QueryField::eq(name, value),
                }
            })),
            Filter::Condition(field) => QueryGroup::and([field]),
            Filter::Conditions(fields) => QueryGroup::and(fields),
            Filter::Group(group) => group,
            Filter::Predicate(predicate) => {
                PredicateCompiler::new(entity, self.case).compile(&predicate)?
            }
            Filter::PrimaryKey(value) => {
                let keys = entity.key_properties();
                match keys.as_slice() {
                    [key] => QueryGroup::and([QueryField::eq(key.field(), value)]),
                    [] => {
                        return Err(QueryError::UnsupportedFilterShape(format!(
                            "{} declares no primary key",
                            entity.name()
                        )))
                    }
                    _ => {
                        return Err(QueryError::UnsupportedFilterShape(format!(
                            "{} has a composite key; filter on its members instead",
                            entity.name()
                        )))
                    }
                }
            }
        };
        group.validate()?;
        Ok(group)
    }
}

/// Normalize with exact field matching.
pub fn normalize(filter: impl Into<Filter>, entity: &EntityDefinition) -> QueryResult<QueryGroup> {
    Normalizer::default().normalize(filter.into(), entity)
}
