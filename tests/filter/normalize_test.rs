//! Filter normalization tests.

use quarry::entity::{EntityDefinition, PropertyDef};
use quarry::error::QueryError;
use quarry::filter::{
    normalize, Conjunction, Field, FieldCase, Filter, Normalizer, Operator, QueryField, QueryGroup,
};
use quarry::record;
use quarry::value::{Value, ValueKind};
use serde_json::json;

fn customer() -> EntityDefinition {
    EntityDefinition::builder("Customer")
        .property(PropertyDef::new("Id", ValueKind::Int).primary().identity())
        .property(PropertyDef::new("Name", ValueKind::Text))
        .property(PropertyDef::new("DeletedAt", ValueKind::DateTime))
        .build()
}

#[test]
fn test_equivalent_shapes_normalize_identically() {
    let entity = customer();
    let from_record = normalize(record! { "Id" => 5 }, &entity).unwrap();
    let from_condition = normalize(QueryField::eq("Id", 5), &entity).unwrap();
    let from_sequence = normalize(vec![QueryField::eq("Id", 5)], &entity).unwrap();
    let from_key = normalize(Filter::key(5), &entity).unwrap();

    assert_eq!(from_record, from_condition);
    assert_eq!(from_condition, from_sequence);
    assert_eq!(from_sequence, from_key);
    assert_eq!(from_record.conjunction, Conjunction::And);
    assert_eq!(from_record.fields(), vec![&QueryField::eq("Id", 5)]);
}

#[test]
fn test_dynamic_record_preserves_member_order() {
    let entity = customer();
    let group = normalize(record! { "Name" => "Ada", "Id" => 3 }, &entity).unwrap();
    let names: Vec<&str> = group.fields().iter().map(|f| f.field.name()).collect();
    assert_eq!(names, vec!["Name", "Id"]);
}

#[test]
fn test_dynamic_list_member_becomes_membership() {
    let entity = customer();
    let group = normalize(record! { "Id" => vec![1, 2, 3] }, &entity).unwrap();
    let field = group.fields()[0];
    assert_eq!(field.operator, Operator::In);
    assert_eq!(field.value, Value::from(vec![1, 2, 3]));
}

#[test]
fn test_group_passes_through() {
    let entity = customer();
    let group = QueryGroup::or([QueryField::eq("Id", 1), QueryField::eq("Id", 2)]);
    assert_eq!(normalize(group.clone(), &entity).unwrap(), group);
}

#[test]
fn test_cardinality_violations() {
    let entity = customer();
    let between = QueryField::new("Id", Operator::Between, vec![1]);
    assert!(matches!(
        normalize(between, &entity),
        Err(QueryError::InvalidOperatorArgument {
            operator: Operator::Between,
            ..
        })
    ));

    let scalar_in = QueryField::new("Id", Operator::In, 1);
    assert!(matches!(
        normalize(scalar_in, &entity),
        Err(QueryError::InvalidOperatorArgument { .. })
    ));

    let null_with_value = QueryField::new("Name", Operator::IsNull, "x");
    assert!(normalize(null_with_value, &entity).is_err());
}

#[test]
fn test_key_filter_needs_a_single_key() {
    let keyless = EntityDefinition::builder("Log")
        .property(PropertyDef::new("Message", ValueKind::Text))
        .build();
    assert!(matches!(
        normalize(Filter::key(1), &keyless),
        Err(QueryError::UnsupportedFilterShape(_))
    ));

    let composite = EntityDefinition::builder("Pair")
        .property(PropertyDef::new("A", ValueKind::Int).primary())
        .property(PropertyDef::new("B", ValueKind::Int).primary())
        .build();
    assert!(normalize(Filter::key(1), &composite).is_err());
}

#[test]
fn test_json_filters() {
    let entity = customer();

    let filter = Filter::from_json(&json!({"DeletedAt": null, "Id": [1, 2]})).unwrap();
    let group = normalize(filter, &entity).unwrap();
    assert_eq!(group.fields()[0].value, Value::Null);
    assert_eq!(group.fields()[1].operator, Operator::In);

    let filter = Filter::from_json(&json!([
        {"field": "Id", "operator": "gte", "value": 10},
        {"field": "Name", "operator": "is_not_null"}
    ]))
    .unwrap();
    let group = normalize(filter, &entity).unwrap();
    assert_eq!(group.fields()[0], &QueryField::gte("Id", 10));
    assert_eq!(group.fields()[1], &QueryField::is_not_null("Name"));

    let group = normalize(Filter::from_json(&json!(5)).unwrap(), &entity).unwrap();
    assert_eq!(group.fields()[0], &QueryField::eq("Id", 5));

    assert!(matches!(
        Filter::from_json(&json!(null)),
        Err(QueryError::UnsupportedFilterShape(_))
    ));
    assert!(Filter::from_json(&json!({"Id": {"nested": 1}})).is_err());
}

#[test]
fn test_field_equality_ignores_kind() {
    assert_eq!(Field::with_kind("Id", ValueKind::Int), Field::new("Id"));
    assert_ne!(Field::new("Id"), Field::new("id"));
    assert!(FieldCase::Insensitive.matches("Id", "ID"));

    let entity = customer();
    let normalizer = Normalizer::new(FieldCase::Insensitive);
    let group = normalizer.normalize(Filter::key(7), &entity).unwrap();
    assert_eq!(group.fields()[0].field.name(), "Id");
}
