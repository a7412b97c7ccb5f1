//! Upsert statement tests: MERGE, ON CONFLICT and ON DUPLICATE KEY UPDATE.

use insta::assert_snapshot;
use quarry::entity::{EntityDefinition, PropertyDef, TableName};
use quarry::error::QueryError;
use quarry::record;
use quarry::sql::Dialect;
use quarry::statement::{
    CompiledStatement, MergeSpec, Operation, StatementBuilder, StatementRequest,
};
use quarry::types::TypeResolutionChain;
use quarry::value::{Value, ValueKind};
use sqlparser::dialect::{MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

fn customer() -> EntityDefinition {
    EntityDefinition::builder("Customer")
        .property(PropertyDef::new("Id", ValueKind::Int).primary().identity())
        .property(PropertyDef::new("Name", ValueKind::Text))
        .build()
}

fn merge(
    dialect: Dialect,
    entity: &EntityDefinition,
    spec: MergeSpec,
    hints: Option<&str>,
) -> Result<CompiledStatement, QueryError> {
    let types = TypeResolutionChain::default();
    StatementBuilder::new(dialect, &types)
        .build(&StatementRequest::new(entity, Operation::Merge(spec)).hints(hints))
}

#[test]
fn test_merge_matches_on_identity_by_default() {
    let entity = customer();
    let stmt = merge(
        Dialect::TSql,
        &entity,
        MergeSpec::new(record! { "Id" => 5 }),
        None,
    )
    .unwrap();

    assert_snapshot!(stmt.sql(), @"MERGE INTO [Customer] AS [T] USING (SELECT @p0 AS [Id]) AS [S] ON ([T].[Id] = [S].[Id]) WHEN NOT MATCHED THEN INSERT DEFAULT VALUES OUTPUT INSERTED.[Id] AS [Result];");
    let p0 = stmt.parameter("p0").unwrap();
    assert_eq!(p0.value, Value::Int(5));
    assert_eq!(stmt.parameters().len(), 1);
}

#[test]
fn test_merge_updates_non_key_columns() {
    let entity = customer();
    let stmt = merge(
        Dialect::TSql,
        &entity,
        MergeSpec::new(record! { "Id" => 5, "Name" => "Ada" }),
        Some("WITH (HOLDLOCK)"),
    )
    .unwrap();

    assert_snapshot!(stmt.sql(), @"MERGE INTO [Customer] WITH (HOLDLOCK) AS [T] USING (SELECT @p0 AS [Id], @p1 AS [Name]) AS [S] ON ([T].[Id] = [S].[Id]) WHEN NOT MATCHED THEN INSERT ([Name]) VALUES ([S].[Name]) WHEN MATCHED THEN UPDATE SET [Name] = [S].[Name] OUTPUT INSERTED.[Id] AS [Result];");
}

#[test]
fn test_explicit_qualifiers_override_key() {
    let entity = customer();
    let stmt = merge(
        Dialect::TSql,
        &entity,
        MergeSpec::new(record! { "Id" => 5, "Name" => "Ada" }).qualifiers(["Name"]),
        None,
    )
    .unwrap();

    assert!(stmt
        .sql()
        .contains("ON ([T].[Name] = [S].[Name]) WHEN NOT MATCHED"));
    assert!(!stmt.sql().contains("[T].[Id]"));
    assert!(!stmt.sql().contains("WHEN MATCHED THEN UPDATE"));
}

#[test]
fn test_on_conflict_sqlite() {
    let entity = customer();
    let stmt = merge(
        Dialect::Sqlite,
        &entity,
        MergeSpec::new(record! { "Id" => 5, "Name" => "Ada" }),
        Some("ignored"),
    )
    .unwrap();
    assert_snapshot!(stmt.sql(), @r#"INSERT INTO "Customer" ("Id", "Name") VALUES (@p0, @p1) ON CONFLICT ("Id") DO UPDATE SET "Name" = excluded."Name" RETURNING "Id""#);
}

#[test]
fn test_on_conflict_leaves_null_identity_to_database() {
    let entity = customer();
    let stmt = merge(
        Dialect::Postgres,
        &entity,
        MergeSpec::new(record! { "Id" => Value::Null, "Name" => "Ada" }),
        None,
    )
    .unwrap();
    assert_snapshot!(stmt.sql(), @r#"INSERT INTO "Customer" ("Name") VALUES ($1) ON CONFLICT ("Id") DO UPDATE SET "Name" = excluded."Name" RETURNING "Id""#);
    assert_eq!(stmt.parameters().len(), 1);
    assert!(Parser::parse_sql(&PostgreSqlDialect {}, stmt.sql()).is_ok());
}

#[test]
fn test_on_conflict_do_nothing_when_only_keys() {
    let entity = customer();
    let stmt = merge(
        Dialect::Postgres,
        &entity,
        MergeSpec::new(record! { "Id" => 9 }),
        None,
    )
    .unwrap();
    assert_snapshot!(stmt.sql(), @r#"INSERT INTO "Customer" ("Id") VALUES ($1) ON CONFLICT ("Id") DO NOTHING RETURNING "Id""#);
}

#[test]
fn test_on_duplicate_key_mysql() {
    let entity = customer();
    let stmt = merge(
        Dialect::MySql,
        &entity,
        MergeSpec::new(record! { "Id" => 5, "Name" => "Ada" }),
        None,
    )
    .unwrap();
    assert_snapshot!(stmt.sql(), @"INSERT INTO `Customer` (`Id`, `Name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `Name` = VALUES(`Name`)");
    assert!(Parser::parse_sql(&MySqlDialect {}, stmt.sql()).is_ok());

    let stmt = merge(
        Dialect::MySql,
        &entity,
        MergeSpec::new(record! { "Id" => 5 }),
        None,
    )
    .unwrap();
    assert!(stmt.sql().ends_with("ON DUPLICATE KEY UPDATE `Id` = `Id`"));
}

#[test]
fn test_on_duplicate_key_with_explicit_qualifiers() {
    let entity = customer();
    let stmt = merge(
        Dialect::MySql,
        &entity,
        MergeSpec::new(record! { "Id" => 5, "Name" => "Ada" }).qualifiers(["Id"]),
        None,
    )
    .unwrap();
    assert_snapshot!(stmt.sql(), @"INSERT INTO `Customer` (`Id`, `Name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `Name` = VALUES(`Name`)");

    let err = merge(
        Dialect::MySql,
        &entity,
        MergeSpec::new(record! { "Id" => 5, "Name" => "Ada" }).qualifiers(["Name"]),
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        QueryError::QualifierNotKey { dialect: Dialect::MySql, ref qualifiers } if qualifiers == "Name"
    ));

    // Without key metadata the match cannot be checked.
    let tags = EntityDefinition::table_only(TableName::new("Tags"));
    let spec = MergeSpec::new(record! { "Code" => "rs", "Label" => "Rust" }).qualifiers(["Code"]);
    assert!(matches!(
        merge(Dialect::MySql, &tags, spec.clone(), None),
        Err(QueryError::QualifierNotKey { .. })
    ));
    let spec = spec.key_columns(vec!["Code".to_string()]);
    assert!(merge(Dialect::MySql, &tags, spec, None).is_ok());
}

#[test]
fn test_list_member_is_rejected_before_execution() {
    let entity = customer();
    for dialect in [Dialect::Sqlite, Dialect::Postgres, Dialect::TSql, Dialect::MySql] {
        let err = merge(
            dialect,
            &entity,
            MergeSpec::new(record! { "Id" => 5, "Name" => Value::List(vec![Value::from("a")]) }),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::MergeListValue { ref field } if field == "Name"));
    }
}

#[test]
fn test_dynamic_table_uses_reported_keys() {
    let tags = EntityDefinition::table_only(TableName::new("Tags"));
    let record = record! { "Code" => "rs", "Label" => "Rust" };

    let err = merge(Dialect::Sqlite, &tags, MergeSpec::new(record.clone()), None).unwrap_err();
    assert!(matches!(err, QueryError::NoQualifierAvailable { .. }));

    let spec = MergeSpec::new(record).key_columns(vec!["Code".to_string()]);
    let stmt = merge(Dialect::Sqlite, &tags, spec, None).unwrap();
    assert_snapshot!(stmt.sql(), @r#"INSERT INTO "Tags" ("Code", "Label") VALUES (@p0, @p1) ON CONFLICT ("Code") DO UPDATE SET "Label" = excluded."Label" RETURNING "Code""#);
}

#[test]
fn test_qualifier_must_be_in_record() {
    let entity = customer();
    let err = merge(
        Dialect::Sqlite,
        &entity,
        MergeSpec::new(record! { "Name" => "Ada" }).qualifiers(["Email"]),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::UnknownQualifier { field } if field == "Email"));

    // Default key missing from the record
    let err = merge(
        Dialect::Sqlite,
        &entity,
        MergeSpec::new(record! { "Name" => "Ada" }),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::UnknownQualifier { .. }));
}
