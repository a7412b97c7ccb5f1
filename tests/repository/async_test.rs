//! The async repository over SQLite.

use once_cell::sync::Lazy;
use quarry::entity::{Entity, EntityDefinition, FromRecord, MappingError, PropertyDef};
use quarry::error::QueryError;
use quarry::exec::{CancellationSignal, ExecutionError, SqliteConnection};
use quarry::filter::{Filter, OrderField, QueryField};
use quarry::record;
use quarry::repository::{AsyncRepository, QueryOptions};
use quarry::value::{Record, Value, ValueKind};

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: Option<i64>,
    label: String,
}

static ITEM: Lazy<EntityDefinition> = Lazy::new(|| {
    EntityDefinition::builder("Item")
        .property(PropertyDef::new("Id", ValueKind::Int).primary().identity())
        .property(PropertyDef::new("Label", ValueKind::Text))
        .build()
});

impl FromRecord for Item {
    fn from_record(record: &Record) -> Result<Self, MappingError> {
        Ok(Item {
            id: record.get_as("Id")?,
            label: record.get_as("Label")?,
        })
    }
}

impl Entity for Item {
    fn definition() -> &'static EntityDefinition {
        &ITEM
    }

    fn to_record(&self) -> Record {
        record! { "Id" => self.id, "Label" => self.label.as_str() }
    }
}

fn repository(rows: i64) -> AsyncRepository<SqliteConnection> {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE Item (Id INTEGER PRIMARY KEY, Label TEXT NOT NULL);")
        .unwrap();
    let seed: String = (1..=rows)
        .map(|id| format!("INSERT INTO Item (Id, Label) VALUES ({id}, 'item {id}');\n"))
        .collect();
    conn.execute_batch(&seed).unwrap();
    AsyncRepository::new(conn)
}

#[tokio::test]
async fn test_batch_query() {
    let repo = repository(12);
    let page: Vec<Item> = repo
        .batch_query(1, 5, &[OrderField::asc("Id")], None, None, None)
        .await
        .unwrap();
    let ids: Vec<_> = page.iter().filter_map(|i| i.id).collect();
    assert_eq!(ids, vec![6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn test_count_and_query() {
    let repo = repository(12);
    let filter = Filter::from(QueryField::gt("Id", 9));
    assert_eq!(repo.count::<Item>(Some(filter), None, None).await.unwrap(), 3);

    let found: Vec<Item> = repo
        .query(QueryField::eq("Label", "item 4"), &QueryOptions::new(), None)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, Some(4));
}

#[tokio::test]
async fn test_merge_inserts_then_updates() {
    let repo = repository(0);
    let id = repo
        .merge(&Item { id: None, label: "new".into() }, &[], None)
        .await
        .unwrap();
    assert_eq!(id, Value::Int(1));

    let same = repo
        .merge(&Item { id: Some(1), label: "renamed".into() }, &[], None)
        .await
        .unwrap();
    assert_eq!(same, Value::Int(1));

    let found: Vec<Item> = repo
        .query(Filter::key(1), &QueryOptions::new(), None)
        .await
        .unwrap();
    assert_eq!(found[0].label, "renamed");
}

#[tokio::test]
async fn test_cancelled_before_execution() {
    let repo = repository(3);
    repo.cancellation().cancel();

    let err = repo.count::<Item>(None, None, None).await.unwrap_err();
    assert!(matches!(err, QueryError::Execution(ExecutionError::Cancelled)));
}

#[tokio::test]
async fn test_cancellation_is_per_handle() {
    let repo = repository(3);
    let signal = CancellationSignal::new();
    let scoped = repo.with_cancellation(signal.clone());
    signal.cancel();

    let err = scoped.count::<Item>(None, None, None).await.unwrap_err();
    assert!(matches!(err, QueryError::Execution(ref e) if e.is_cancelled()));
    assert_eq!(repo.count::<Item>(None, None, None).await.unwrap(), 3);
}

#[tokio::test]
async fn test_validation_errors_skip_the_connection() {
    let repo = repository(3);
    repo.cancellation().cancel();
    // Building fails before the cancelled connection is reached.
    let err = repo
        .batch_query::<Item>(0, 0, &[OrderField::asc("Id")], None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidPageArgument(_)));
}
