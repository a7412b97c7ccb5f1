//! Repositories: the query pipeline end to end.
//!
//! Every operation walks the same stages (see [`Stage`]): the filter is
//! normalized, a statement is built for the connection's dialect, the
//! connection executes it, and rows are mapped back. Validation failures are
//! raised before the connection is touched; execution failures surface
//! unmodified.
//!
//! [`Repository`] runs on a blocking [`Connection`], [`AsyncRepository`] on an
//! [`AsyncConnection`](crate::exec::AsyncConnection). Both share one planner,
//! so they emit identical SQL for identical inputs.

mod async_repo;
mod pipeline;
mod planner;

pub use async_repo::AsyncRepository;
pub use pipeline::Stage;

use std::sync::Arc;

use dashmap::DashMap;

use crate::entity::{Entity, EntityDefinition, FromRecord, TableName};
use crate::error::QueryResult;
use crate::exec::Connection;
use crate::filter::{Field, FieldCase, Filter, OrderField};
use crate::statement::{BuildOptions, CompiledStatement, MergeSpec};
use crate::types::TypeResolutionChain;
use crate::value::{Record, Value};
use pipeline::Pipeline;
use planner::{count_of, map_rows, Planner};

/// Repository-wide policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryOptions {
    pub field_case: FieldCase,
    pub require_order_by: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        let build = BuildOptions::default();
        Self {
            field_case: build.field_case,
            require_order_by: build.require_order_by,
        }
    }
}

impl RepositoryOptions {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            field_case: self.field_case,
            require_order_by: self.require_order_by,
        }
    }
}

/// Optional parts of a plain query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct QueryOptions {
    pub columns: Vec<Field>,
    pub order_by: Vec<OrderField>,
    pub top: Option<u64>,
    /// Inserted verbatim. Must come from trusted code.
    pub hints: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: Vec<Field>) -> Self {
        self.columns = columns;
        self
    }

    pub fn order_by(mut self, order_by: Vec<OrderField>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn top(mut self, top: u64) -> Self {
        self.top = Some(top);
        self
    }

    pub fn hints(mut self, hints: impl Into<String>) -> Self {
        self.hints = Some(hints.into());
        self
    }
}

/// Blocking repository over a [`Connection`].
///
/// # Example
///
/// ```ignore
/// let repo = Repository::new(SqliteConnection::open_in_memory()?);
/// let page: Vec<Customer> = repo.batch_query(2, 10, &[OrderField::asc("Id")], None, None, None)?;
/// let id = repo.merge(&customer, &[], None)?;
/// ```
#[derive(Debug)]
pub struct Repository<C: Connection> {
    connection: C,
    types: Arc<TypeResolutionChain>,
    options: RepositoryOptions,
    key_cache: DashMap<TableName, Vec<String>>,
}

impl<C: Connection> Repository<C> {
    /// A repository using the process-wide type resolver.
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            types: TypeResolutionChain::global(),
            options: RepositoryOptions::default(),
            key_cache: DashMap::new(),
        }
    }

    pub fn with_types(mut self, types: Arc<TypeResolutionChain>) -> Self {
        self.types = types;
        self
    }

    pub fn with_options(mut self, options: RepositoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    fn planner(&self) -> Planner<'_> {
        Planner::new(self.connection.dialect(), &self.types, &self.options)
    }

    fn execute(
        &self,
        pipeline: &mut Pipeline,
        statement: &CompiledStatement,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<Record>> {
        pipeline.advance(Stage::Executing);
        let rows = self.connection.fetch(statement, tx)?;
        pipeline.advance(Stage::Mapping);
        Ok(rows)
    }

    /// Rows of `E` matching `filter`.
    pub fn query<E: Entity>(
        &self,
        filter: impl Into<Filter>,
        options: &QueryOptions,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<E>> {
        self.query_as(E::definition(), Some(filter.into()), options, tx)
    }

    /// Untyped rows of `entity` matching `filter`.
    pub fn query_records(
        &self,
        entity: &EntityDefinition,
        filter: impl Into<Filter>,
        options: &QueryOptions,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<Record>> {
        self.query_as(entity, Some(filter.into()), options, tx)
    }

    fn query_as<T: FromRecord>(
        &self,
        entity: &EntityDefinition,
        filter: Option<Filter>,
        options: &QueryOptions,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<T>> {
        let mut pipeline = Pipeline::start("query", entity.name());
        let result = (|| {
            let statement = self.planner().query(&mut pipeline, entity, filter, options)?;
            let rows = self.execute(&mut pipeline, &statement, tx)?;
            map_rows(&rows)
        })();
        pipeline.finish(result)
    }

    /// At most `rows_per_batch` rows of `E`, starting at row
    /// `page * rows_per_batch` of the ordered result.
    pub fn batch_query<E: Entity>(
        &self,
        page: u64,
        rows_per_batch: u64,
        order_by: &[OrderField],
        filter: Option<Filter>,
        hints: Option<&str>,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<E>> {
        self.batch_query_as(E::definition(), page, rows_per_batch, order_by, filter, hints, tx)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn batch_query_records(
        &self,
        entity: &EntityDefinition,
        page: u64,
        rows_per_batch: u64,
        order_by: &[OrderField],
        filter: Option<Filter>,
        hints: Option<&str>,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<Record>> {
        self.batch_query_as(entity, page, rows_per_batch, order_by, filter, hints, tx)
    }

    #[allow(clippy::too_many_arguments)]
    fn batch_query_as<T: FromRecord>(
        &self,
        entity: &EntityDefinition,
        page: u64,
        rows_per_batch: u64,
        order_by: &[OrderField],
        filter: Option<Filter>,
        hints: Option<&str>,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<T>> {
        let mut pipeline = Pipeline::start("batch_query", entity.name());
        let result = (|| {
            let statement = self.planner().batch_query(
                &mut pipeline,
                entity,
                page,
                rows_per_batch,
                order_by,
                filter,
                hints,
            )?;
            let rows = self.execute(&mut pipeline, &statement, tx)?;
            map_rows(&rows)
        })();
        pipeline.finish(result)
    }

    /// Number of rows of `E` matching `filter`.
    pub fn count<E: Entity>(
        &self,
        filter: Option<Filter>,
        hints: Option<&str>,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<u64> {
        self.count_records(E::definition(), filter, hints, tx)
    }

    pub fn count_records(
        &self,
        entity: &EntityDefinition,
        filter: Option<Filter>,
        hints: Option<&str>,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<u64> {
        let mut pipeline = Pipeline::start("count", entity.name());
        let result = (|| {
            let statement = self.planner().count(&mut pipeline, entity, filter, hints)?;
            let rows = self.execute(&mut pipeline, &statement, tx)?;
            count_of(&rows)
        })();
        pipeline.finish(result)
    }

    /// Insert or update `item`, matching on `qualifiers` or, when empty, on
    /// the entity's key. Returns the identity value.
    pub fn merge<E: Entity>(
        &self,
        item: &E,
        qualifiers: &[Field],
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Value> {
        self.merge_record(E::definition(), item.to_record(), qualifiers, tx)
    }

    /// Insert or update a record. For definitions without key metadata the
    /// connection's key columns are used when no qualifiers are given.
    pub fn merge_record(
        &self,
        entity: &EntityDefinition,
        record: Record,
        qualifiers: &[Field],
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Value> {
        let mut pipeline = Pipeline::start("merge", entity.name());
        let result = (|| {
            let planner = self.planner();
            let mut spec = MergeSpec::new(record).qualifiers(qualifiers.iter().cloned());
            if planner.needs_key_columns(entity, qualifiers) {
                spec.key_columns = self.key_columns(entity.table())?;
            }
            let statement = planner.merge(&mut pipeline, entity, spec.clone())?;
            let rows = self.execute(&mut pipeline, &statement, tx)?;
            planner.merge_result(entity, &spec, &rows)
        })();
        pipeline.finish(result)
    }

    fn key_columns(&self, table: &TableName) -> QueryResult<Vec<String>> {
        if let Some(keys) = self.key_cache.get(table) {
            return Ok(keys.clone());
        }
        let keys = self.connection.key_columns(table)?;
        self.key_cache.insert(table.clone(), keys.clone());
        Ok(keys)
    }
}
