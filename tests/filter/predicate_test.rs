//! Predicate expressions compiled through to SQL.

use quarry::entity::{EntityDefinition, PropertyDef};
use quarry::error::QueryError;
use quarry::exec::SqliteConnection;
use quarry::filter::{constant, normalize, not, prop, Operator, Predicate, PredicateExt};
use quarry::repository::{QueryOptions, Repository};
use quarry::sql::Dialect;
use quarry::statement::{CompiledStatement, Operation, StatementBuilder, StatementRequest};
use quarry::types::TypeResolutionChain;
use quarry::value::{Value, ValueKind};

fn person() -> EntityDefinition {
    EntityDefinition::builder("Person")
        .property(PropertyDef::new("Id", ValueKind::Int).primary())
        .property(PropertyDef::new("Name", ValueKind::Text).column("full_name"))
        .property(PropertyDef::new("Age", ValueKind::Int))
        .property(PropertyDef::new("Active", ValueKind::Bool))
        .build()
}

fn select(predicate: quarry::filter::Predicate, dialect: Dialect) -> CompiledStatement {
    let entity = person();
    let types = TypeResolutionChain::default();
    let group = normalize(predicate, &entity).unwrap();
    StatementBuilder::new(dialect, &types)
        .build(&StatementRequest::new(&entity, Operation::Query).filter(group))
        .unwrap()
}

fn values(stmt: &CompiledStatement) -> Vec<Value> {
    stmt.parameters().iter().map(|p| p.value.clone()).collect()
}

#[test]
fn test_comparison_uses_mapped_column() {
    let stmt = select(prop("Name").eq("Ada"), Dialect::Postgres);
    assert_eq!(
        stmt.sql(),
        r#"SELECT "Id", "full_name", "Age", "Active" FROM "Person" WHERE "full_name" = $1"#
    );
    assert_eq!(values(&stmt), vec![Value::from("Ada")]);
}

#[test]
fn test_mixed_conjunctions_nest_with_parentheses() {
    let stmt = select(
        prop("Age")
            .gte(18)
            .and(prop("Name").starts_with("A").or(prop("Name").ends_with("z"))),
        Dialect::Postgres,
    );
    assert!(stmt.sql().ends_with(
        r#"WHERE "Age" >= $1 AND ("full_name" LIKE $2 ESCAPE '!' OR "full_name" LIKE $3 ESCAPE '!')"#
    ));
    assert_eq!(
        values(&stmt),
        vec![Value::Int(18), Value::from("A%"), Value::from("%z")]
    );
}

#[test]
fn test_membership_and_range() {
    let stmt = select(
        prop("Id").is_in(vec![1, 2, 3]).and(prop("Age").between(20, 30)),
        Dialect::MySql,
    );
    assert!(stmt
        .sql()
        .ends_with("WHERE `Id` IN (?, ?, ?) AND `Age` BETWEEN ? AND ?"));
    assert_eq!(stmt.parameters().len(), 5);
}

#[test]
fn test_negation() {
    let stmt = select(not(prop("Id").is_in(vec![4, 5])), Dialect::Sqlite);
    assert!(stmt.sql().ends_with(r#"WHERE "Id" NOT IN (@p0, @p1)"#));

    let stmt = select(
        not(prop("Age").lt(10).or(prop("Age").gt(90))),
        Dialect::Sqlite,
    );
    assert!(stmt
        .sql()
        .ends_with(r#"WHERE NOT ("Age" < @p0 OR "Age" > @p1)"#));
}

#[test]
fn test_null_and_boolean_shorthands() {
    let stmt = select(prop("Name").is_null().and(prop("Active")), Dialect::TSql);
    assert!(stmt
        .sql()
        .ends_with("WHERE [full_name] IS NULL AND [Active] = @p0"));
    assert_eq!(values(&stmt), vec![Value::Bool(true)]);
}

#[test]
fn test_contains_on_text_is_a_pattern() {
    let entity = person();
    let group = normalize(prop("Name").contains("da"), &entity).unwrap();
    let field = group.fields()[0];
    assert_eq!(field.operator, Operator::Like);
    assert_eq!(field.value, Value::from("%da%"));
    assert_eq!(field.escape, Some('!'));
}

#[test]
fn test_unsupported_predicates() {
    let entity = person();
    assert!(matches!(
        normalize(constant(1).eq(constant(1)), &entity),
        Err(QueryError::UnsupportedExpression(_))
    ));
    assert!(matches!(
        normalize(prop("Age").call("abs", vec![]), &entity),
        Err(QueryError::UnsupportedExpression(_))
    ));
    assert!(normalize(prop("Age"), &entity).is_err());
}

fn names_matching(repo: &Repository<SqliteConnection>, predicate: Predicate) -> Vec<String> {
    let options = QueryOptions::new().order_by(vec![quarry::filter::OrderField::asc("Id")]);
    repo.query_records(&person(), predicate, &options, None)
        .unwrap()
        .iter()
        .map(|r| match r.get("full_name") {
            Some(Value::Text(s)) => s.clone(),
            other => panic!("unexpected name {:?}", other),
        })
        .collect()
}

#[test]
fn test_pattern_text_matches_literally() {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE Person (Id INTEGER PRIMARY KEY, full_name TEXT, Age INTEGER, Active INTEGER);
         INSERT INTO Person (Id, full_name) VALUES
             (1, '50%'), (2, '50 units'), (3, 'a_b'), (4, 'axb'), (5, 'wow!'), (6, 'wow');",
    )
    .unwrap();
    let repo = Repository::new(conn);

    assert_eq!(names_matching(&repo, prop("Name").contains("50%")), vec!["50%"]);
    assert_eq!(names_matching(&repo, prop("Name").contains("a_b")), vec!["a_b"]);
    assert_eq!(names_matching(&repo, prop("Name").starts_with("a_")), vec!["a_b"]);
    assert_eq!(names_matching(&repo, prop("Name").ends_with("w!")), vec!["wow!"]);
    assert_eq!(
        names_matching(&repo, not(prop("Name").contains("%"))),
        vec!["50 units", "a_b", "axb", "wow!", "wow"]
    );
}
