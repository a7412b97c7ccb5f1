//! Type resolution precedence and its effect on bound parameters.

use std::sync::Arc;
use std::thread;

use quarry::entity::{EntityDefinition, PropertyDef};
use quarry::filter::{normalize, QueryField};
use quarry::sql::Dialect;
use quarry::statement::{Operation, StatementBuilder, StatementRequest};
use quarry::types::{DbType, PropertyKey, TypeMapper, TypeResolutionChain};
use quarry::value::ValueKind;

fn mapper() -> TypeMapper {
    let mut mapper = TypeMapper::new();
    mapper
        .map_kind(ValueKind::Text, DbType::AnsiString)
        .map_kind(ValueKind::Int, DbType::Int64)
        .map_property(PropertyKey::new("Customer", "Code"), DbType::String)
        .map_property(PropertyKey::new("Customer", "Tag"), DbType::String);
    mapper
}

#[test]
fn test_annotation_beats_property_beats_type() {
    let chain = TypeResolutionChain::new(mapper());

    let annotated = PropertyDef::new("Tag", ValueKind::Text).db_type(DbType::Xml);
    let property_mapped = PropertyDef::new("Code", ValueKind::Text);
    let type_mapped = PropertyDef::new("Name", ValueKind::Text);
    let unmapped = PropertyDef::new("Price", ValueKind::Decimal);

    assert_eq!(chain.resolve("Customer", &annotated), Some(DbType::Xml));
    assert_eq!(chain.resolve("Customer", &property_mapped), Some(DbType::String));
    assert_eq!(chain.resolve("Customer", &type_mapped), Some(DbType::AnsiString));
    assert_eq!(chain.resolve("Customer", &unmapped), None);
}

#[test]
fn test_property_mapping_is_scoped_to_declaring_entity() {
    let chain = TypeResolutionChain::new(mapper());
    let code = PropertyDef::new("Code", ValueKind::Text);
    assert_eq!(chain.resolve("Supplier", &code), Some(DbType::AnsiString));
    assert_eq!(chain.resolve("Customer", &code), Some(DbType::String));
}

#[test]
fn test_property_key_parsing() {
    let key = PropertyKey::parse("Sales.Customer.Code").unwrap();
    assert_eq!(key, PropertyKey::new("Sales.Customer", "Code"));
    assert_eq!(key.to_string(), "Sales.Customer.Code");
    assert!(PropertyKey::parse("Code").is_none());
    assert!(PropertyKey::parse("Customer.").is_none());
}

#[test]
fn test_concurrent_resolution_is_consistent() {
    let chain = Arc::new(TypeResolutionChain::new(mapper()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let chain = Arc::clone(&chain);
            thread::spawn(move || {
                let code = PropertyDef::new("Code", ValueKind::Text);
                (0..100)
                    .map(|_| chain.resolve("Customer", &code))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        let results = handle.join().unwrap();
        assert!(results.iter().all(|r| *r == Some(DbType::String)));
    }
    assert_eq!(chain.cached(), 1);
}

#[test]
fn test_resolved_types_reach_parameters() {
    let entity = EntityDefinition::builder("Customer")
        .property(PropertyDef::new("Id", ValueKind::Int).primary())
        .property(PropertyDef::new("Code", ValueKind::Text))
        .build();
    let chain = TypeResolutionChain::new(mapper());
    let builder = StatementBuilder::new(Dialect::TSql, &chain);

    let group = normalize(
        vec![
            QueryField::eq("Id", 1),
            QueryField::eq("Code", "A-1"),
            QueryField::eq("Unmapped", "x"),
            QueryField::eq("Flag", true),
        ],
        &entity,
    )
    .unwrap();
    let stmt = builder
        .build(&StatementRequest::new(&entity, Operation::Count).filter(group))
        .unwrap();

    let types: Vec<_> = stmt.parameters().iter().map(|p| p.db_type).collect();
    assert_eq!(
        types,
        vec![
            Some(DbType::Int64),
            Some(DbType::String),
            // Unknown names fall back to the value's kind
            Some(DbType::AnsiString),
            None,
        ]
    );
}

#[test]
fn test_global_chain_is_installed_once() {
    let first = TypeResolutionChain::global();
    let rejected = TypeResolutionChain::install_global(TypeResolutionChain::new(mapper()));
    assert!(rejected.is_err());
    assert!(Arc::ptr_eq(&first, &TypeResolutionChain::global()));
}
