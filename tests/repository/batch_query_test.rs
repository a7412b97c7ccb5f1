//! Batch queries, counts and plain queries against an in-memory SQLite
//! database.

use once_cell::sync::Lazy;
use quarry::entity::{Entity, EntityDefinition, FromRecord, MappingError, PropertyDef};
use quarry::error::QueryError;
use quarry::exec::SqliteConnection;
use quarry::filter::{prop, Filter, OrderField, PredicateExt, QueryField};
use quarry::record;
use quarry::repository::{QueryOptions, Repository, RepositoryOptions};
use quarry::value::{Record, ValueKind};

#[derive(Debug, Clone, PartialEq)]
struct Customer {
    id: i64,
    name: String,
    region: Option<String>,
}

static CUSTOMER: Lazy<EntityDefinition> = Lazy::new(|| {
    EntityDefinition::builder("Customer")
        .property(PropertyDef::new("Id", ValueKind::Int).primary().identity())
        .property(PropertyDef::new("Name", ValueKind::Text))
        .property(PropertyDef::new("Region", ValueKind::Text))
        .build()
});

impl FromRecord for Customer {
    fn from_record(record: &Record) -> Result<Self, MappingError> {
        Ok(Customer {
            id: record.get_as("Id")?,
            name: record.get_as("Name")?,
            region: record.get_as("Region")?,
        })
    }
}

impl Entity for Customer {
    fn definition() -> &'static EntityDefinition {
        &CUSTOMER
    }

    fn to_record(&self) -> Record {
        record! {
            "Id" => self.id,
            "Name" => self.name.as_str(),
            "Region" => self.region.clone(),
        }
    }
}

/// 25 customers, ids 1..=25; every fifth one has no region.
fn seeded() -> Repository<SqliteConnection> {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE Customer (Id INTEGER PRIMARY KEY, Name TEXT NOT NULL, Region TEXT);",
    )
    .unwrap();
    let mut seed = String::new();
    for id in 1..=25 {
        let region = if id % 5 == 0 {
            "NULL".to_string()
        } else if id % 2 == 0 {
            "'north'".to_string()
        } else {
            "'south'".to_string()
        };
        seed.push_str(&format!(
            "INSERT INTO Customer (Id, Name, Region) VALUES ({id}, 'customer {id}', {region});\n"
        ));
    }
    conn.execute_batch(&seed).unwrap();
    Repository::new(conn)
}

fn ids(customers: &[Customer]) -> Vec<i64> {
    customers.iter().map(|c| c.id).collect()
}

#[test]
fn test_first_page() {
    let repo = seeded();
    let page: Vec<Customer> = repo
        .batch_query(0, 10, &[OrderField::asc("Id")], None, None, None)
        .unwrap();
    assert_eq!(ids(&page), (1..=10).collect::<Vec<_>>());
    assert_eq!(page[0].name, "customer 1");
    assert_eq!(page[0].region.as_deref(), Some("south"));
}

#[test]
fn test_last_page_is_partial() {
    let repo = seeded();
    let page: Vec<Customer> = repo
        .batch_query(2, 10, &[OrderField::asc("Id")], None, None, None)
        .unwrap();
    assert_eq!(ids(&page), (21..=25).collect::<Vec<_>>());

    let beyond: Vec<Customer> = repo
        .batch_query(3, 10, &[OrderField::asc("Id")], None, None, None)
        .unwrap();
    assert!(beyond.is_empty());
}

#[test]
fn test_descending_page_with_filter() {
    let repo = seeded();
    let filter = Filter::from(QueryField::eq("Region", "north"));
    let page: Vec<Customer> = repo
        .batch_query(1, 3, &[OrderField::desc("Id")], Some(filter), None, None)
        .unwrap();
    // north: 2, 4, 6, 8, 12, 14, 16, 18, 22, 24 (multiples of 10 have no region)
    assert_eq!(ids(&page), vec![16, 14, 12]);
}

#[test]
fn test_zero_rows_is_rejected() {
    let repo = seeded();
    let err = repo
        .batch_query::<Customer>(0, 0, &[OrderField::asc("Id")], None, None, None)
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidPageArgument(_)));
}

#[test]
fn test_page_size_beyond_sql_integer_is_rejected() {
    let repo = seeded();
    let err = repo
        .batch_query::<Customer>(0, 1 << 63, &[OrderField::asc("Id")], None, None, None)
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidPageArgument(_)));
}

#[test]
fn test_paging_requires_order() {
    let repo = seeded();
    let err = repo
        .batch_query::<Customer>(0, 10, &[], None, None, None)
        .unwrap_err();
    assert!(matches!(err, QueryError::MissingOrderForPaging { .. }));

    let relaxed = seeded().with_options(RepositoryOptions {
        require_order_by: false,
        ..RepositoryOptions::default()
    });
    let page: Vec<Customer> = relaxed.batch_query(0, 10, &[], None, None, None).unwrap();
    assert_eq!(page.len(), 10);
}

#[test]
fn test_count() {
    let repo = seeded();
    assert_eq!(repo.count::<Customer>(None, None, None).unwrap(), 25);

    let missing_region = Filter::from(QueryField::is_null("Region"));
    assert_eq!(
        repo.count::<Customer>(Some(missing_region), None, None).unwrap(),
        5
    );
}

#[test]
fn test_query_with_predicate_and_options() {
    let repo = seeded();
    let options = QueryOptions::new()
        .order_by(vec![OrderField::desc("Id")])
        .top(2);
    let found: Vec<Customer> = repo
        .query(prop("Region").eq("south").and(prop("Id").gt(10)), &options, None)
        .unwrap();
    assert_eq!(ids(&found), vec![23, 21]);
}

#[test]
fn test_query_by_key_and_dynamic_record() {
    let repo = seeded();
    let found: Vec<Customer> = repo
        .query(Filter::key(7), &QueryOptions::new(), None)
        .unwrap();
    assert_eq!(ids(&found), vec![7]);

    let rows = repo
        .query_records(
            Customer::definition(),
            record! { "Id" => vec![3, 4, 5] },
            &QueryOptions::new().order_by(vec![OrderField::asc("Id")]),
            None,
        )
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].get_as::<Option<String>>("Region").unwrap(), None);
}

#[test]
fn test_reads_inside_transaction() {
    let repo = seeded();
    let tx = repo.connection().begin().unwrap();
    repo.connection()
        .execute_batch("INSERT INTO Customer (Id, Name) VALUES (26, 'late');")
        .unwrap();
    assert_eq!(repo.count::<Customer>(None, None, Some(&tx)).unwrap(), 26);
    tx.rollback().unwrap();
    assert_eq!(repo.count::<Customer>(None, None, None).unwrap(), 25);
}

#[test]
fn test_foreign_transaction_is_rejected() {
    let repo = seeded();
    let other = SqliteConnection::open_in_memory().unwrap();
    let tx = other.begin().unwrap();
    let err = repo.count::<Customer>(None, None, Some(&tx)).unwrap_err();
    assert!(matches!(
        err,
        QueryError::Execution(quarry::exec::ExecutionError::ForeignTransaction)
    ));
}
