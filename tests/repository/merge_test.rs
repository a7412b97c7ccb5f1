//! Upserts executed against SQLite.

use once_cell::sync::Lazy;
use quarry::entity::{
    Entity, EntityDefinition, FromRecord, MappingError, PropertyDef, TableName,
};
use quarry::error::QueryError;
use quarry::exec::SqliteConnection;
use quarry::filter::{Field, Filter};
use quarry::record;
use quarry::repository::{QueryOptions, Repository};
use quarry::value::{Record, Value, ValueKind};

#[derive(Debug, Clone, PartialEq)]
struct Account {
    id: Option<i64>,
    email: String,
    name: String,
}

static ACCOUNT: Lazy<EntityDefinition> = Lazy::new(|| {
    EntityDefinition::builder("Account")
        .property(PropertyDef::new("Id", ValueKind::Int).primary().identity())
        .property(PropertyDef::new("Email", ValueKind::Text))
        .property(PropertyDef::new("Name", ValueKind::Text))
        .build()
});

impl FromRecord for Account {
    fn from_record(record: &Record) -> Result<Self, MappingError> {
        Ok(Account {
            id: record.get_as("Id")?,
            email: record.get_as("Email")?,
            name: record.get_as("Name")?,
        })
    }
}

impl Entity for Account {
    fn definition() -> &'static EntityDefinition {
        &ACCOUNT
    }

    fn to_record(&self) -> Record {
        record! {
            "Id" => self.id,
            "Email" => self.email.as_str(),
            "Name" => self.name.as_str(),
        }
    }
}

fn account(id: Option<i64>, email: &str, name: &str) -> Account {
    Account {
        id,
        email: email.to_string(),
        name: name.to_string(),
    }
}

fn repository() -> Repository<SqliteConnection> {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE Account (
             Id INTEGER PRIMARY KEY AUTOINCREMENT,
             Email TEXT NOT NULL UNIQUE,
             Name TEXT NOT NULL
         );
         CREATE TABLE Tags (Code TEXT PRIMARY KEY, Label TEXT);
         CREATE TABLE Notes (Body TEXT);",
    )
    .unwrap();
    Repository::new(conn)
}

fn load(repo: &Repository<SqliteConnection>, id: i64) -> Account {
    let mut found: Vec<Account> = repo
        .query(Filter::key(id), &QueryOptions::new(), None)
        .unwrap();
    assert_eq!(found.len(), 1);
    found.remove(0)
}

#[test]
fn test_insert_returns_generated_identity() {
    let repo = repository();
    let first = repo
        .merge(&account(None, "ada@example.com", "Ada"), &[], None)
        .unwrap();
    let second = repo
        .merge(&account(None, "alan@example.com", "Alan"), &[], None)
        .unwrap();

    assert_eq!(first, Value::Int(1));
    assert_eq!(second, Value::Int(2));
    assert_eq!(load(&repo, 2).name, "Alan");
}

#[test]
fn test_existing_key_is_updated() {
    let repo = repository();
    let id = repo
        .merge(&account(None, "ada@example.com", "Ada"), &[], None)
        .unwrap();
    let id = match id {
        Value::Int(id) => id,
        other => panic!("expected an integer identity, got {:?}", other),
    };

    let again = repo
        .merge(&account(Some(id), "ada@example.com", "Ada Lovelace"), &[], None)
        .unwrap();
    assert_eq!(again, Value::Int(id));
    assert_eq!(load(&repo, id).name, "Ada Lovelace");
    assert_eq!(repo.count::<Account>(None, None, None).unwrap(), 1);
}

#[test]
fn test_explicit_qualifier_matches_on_unique_column() {
    let repo = repository();
    let id = repo
        .merge(&account(None, "grace@example.com", "Grace"), &[], None)
        .unwrap();

    let qualifiers = [Field::new("Email")];
    let again = repo
        .merge(&account(None, "grace@example.com", "Grace Hopper"), &qualifiers, None)
        .unwrap();

    assert_eq!(again, id);
    assert_eq!(repo.count::<Account>(None, None, None).unwrap(), 1);
    assert_eq!(load(&repo, 1).name, "Grace Hopper");
}

#[test]
fn test_unknown_qualifier_fails_before_execution() {
    let repo = repository();
    let err = repo
        .merge(
            &account(None, "x@example.com", "X"),
            &[Field::new("Phone")],
            None,
        )
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownQualifier { field } if field == "Phone"));
    assert_eq!(repo.count::<Account>(None, None, None).unwrap(), 0);
}

#[test]
fn test_dynamic_table_merges_on_reported_key() {
    let repo = repository();
    let tags = EntityDefinition::table_only(TableName::new("Tags"));

    let code = repo
        .merge_record(&tags, record! { "Code" => "rs", "Label" => "Rust" }, &[], None)
        .unwrap();
    assert_eq!(code, Value::from("rs"));

    let code = repo
        .merge_record(
            &tags,
            record! { "Code" => "rs", "Label" => "Rust lang" },
            &[],
            None,
        )
        .unwrap();
    assert_eq!(code, Value::from("rs"));

    let rows = repo
        .query_records(&tags, record! { "Code" => "rs" }, &QueryOptions::new(), None)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Label"), Some(&Value::from("Rust lang")));
}

#[test]
fn test_dynamic_table_without_key_needs_qualifiers() {
    let repo = repository();
    let notes = EntityDefinition::table_only(TableName::new("Notes"));
    let err = repo
        .merge_record(&notes, record! { "Body" => "hello" }, &[], None)
        .unwrap_err();
    assert!(matches!(err, QueryError::NoQualifierAvailable { .. }));
}

#[test]
fn test_merge_inside_transaction_rolls_back() {
    let repo = repository();
    let tx = repo.connection().begin().unwrap();
    repo.merge(&account(None, "tx@example.com", "Temp"), &[], Some(&tx))
        .unwrap();
    assert_eq!(repo.count::<Account>(None, None, Some(&tx)).unwrap(), 1);
    drop(tx);
    assert_eq!(repo.count::<Account>(None, None, None).unwrap(), 0);
}
