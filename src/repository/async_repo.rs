//! Async repository.

use std::sync::Arc;

use dashmap::DashMap;

use super::pipeline::{Pipeline, Stage};
use super::planner::{count_of, map_rows, Planner};
use super::{QueryOptions, RepositoryOptions};
use crate::entity::{Entity, EntityDefinition, FromRecord, TableName};
use crate::error::QueryResult;
use crate::exec::{AsyncConnection, CancellationSignal};
use crate::filter::{Field, Filter, OrderField};
use crate::statement::{CompiledStatement, MergeSpec};
use crate::types::TypeResolutionChain;
use crate::value::{Record, Value};

/// Repository over an [`AsyncConnection`].
///
/// Same operations and SQL as [`Repository`](super::Repository); every
/// operation makes exactly one round trip (plus a one-off key column lookup
/// for dynamic merges). Cancelling the repository's signal aborts its
/// in-flight statements; use [`with_cancellation`](Self::with_cancellation)
/// for an independently cancellable handle.
#[derive(Debug)]
pub struct AsyncRepository<C: AsyncConnection> {
    connection: C,
    types: Arc<TypeResolutionChain>,
    options: RepositoryOptions,
    key_cache: Arc<DashMap<TableName, Vec<String>>>,
    cancel: CancellationSignal,
}

impl<C: AsyncConnection> AsyncRepository<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            types: TypeResolutionChain::global(),
            options: RepositoryOptions::default(),
            key_cache: Arc::new(DashMap::new()),
            cancel: CancellationSignal::new(),
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

    /// A handle sharing the connection and caches but observing `signal`.
    pub fn with_cancellation(&self, signal: CancellationSignal) -> Self
    where
        C: Clone,
    {
        Self {
            connection: self.connection.clone(),
            types: Arc::clone(&self.types),
            options: self.options,
            key_cache: Arc::clone(&self.key_cache),
            cancel: signal,
        }
    }

    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancel
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    fn planner(&self) -> Planner<'_> {
        Planner::new(self.connection.dialect(), &self.types, &self.options)
    }

    async fn execute(
        &self,
        pipeline: &mut Pipeline,
        statement: &CompiledStatement,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<Record>> {
        pipeline.advance(Stage::Executing);
        let rows = self
            .connection
            .fetch_async(statement, tx, &self.cancel)
            .await?;
        pipeline.advance(Stage::Mapping);
        Ok(rows)
    }

    pub async fn query<E: Entity>(
        &self,
        filter: impl Into<Filter>,
        options: &QueryOptions,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<E>> {
        self.query_as(E::definition(), Some(filter.into()), options, tx)
            .await
    }

    pub async fn query_records(
        &self,
        entity: &EntityDefinition,
        filter: impl Into<Filter>,
        options: &QueryOptions,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<Record>> {
        self.query_as(entity, Some(filter.into()), options, tx).await
    }

    async fn query_as<T: FromRecord>(
        &self,
        entity: &EntityDefinition,
        filter: Option<Filter>,
        options: &QueryOptions,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<T>> {
        let mut pipeline = Pipeline::start("query", entity.name());
        let result = async {
            let statement = self.planner().query(&mut pipeline, entity, filter, options)?;
            let rows = self.execute(&mut pipeline, &statement, tx).await?;
            map_rows(&rows)
        }
        .await;
        pipeline.finish(result)
    }

    pub async fn batch_query<E: Entity>(
        &self,
        page: u64,
        rows_per_batch: u64,
        order_by: &[OrderField],
        filter: Option<Filter>,
        hints: Option<&str>,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Vec<E>> {
        self.batch_query_as(E::definition(), page, rows_per_batch, order_by, filter, hints, tx)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn batch_query_records(
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
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn batch_query_as<T: FromRecord>(
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
        let result = async {
            let statement = self.planner().batch_query(
                &mut pipeline,
                entity,
                page,
                rows_per_batch,
                order_by,
                filter,
                hints,
            )?;
            let rows = self.execute(&mut pipeline, &statement, tx).await?;
            map_rows(&rows)
        }
        .await;
        pipeline.finish(result)
    }

    pub async fn count<E: Entity>(
        &self,
        filter: Option<Filter>,
        hints: Option<&str>,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<u64> {
        self.count_records(E::definition(), filter, hints, tx).await
    }

    pub async fn count_records(
        &self,
        entity: &EntityDefinition,
        filter: Option<Filter>,
        hints: Option<&str>,
        tx: Option<&C::Transaction>,
    ) -> QueryResult<u64> {
        let mut pipeline = Pipeline::start("count", entity.name());
        let result = async {
            let statement = self.planner().count(&mut pipeline, entity, filter, hints)?;
            let rows = self.execute(&mut pipeline, &statement, tx).await?;
            count_of(&rows)
        }
        .await;
        pipeline.finish(result)
    }

    pub async fn merge<E: Entity>(
        &self,
        item: &E,
        qualifiers: &[Field],
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Value> {
        self.merge_record(E::definition(), item.to_record(), qualifiers, tx)
            .await
    }

    pub async fn merge_record(
        &self,
        entity: &EntityDefinition,
        record: Record,
        qualifiers: &[Field],
        tx: Option<&C::Transaction>,
    ) -> QueryResult<Value> {
        let mut pipeline = Pipeline::start("merge", entity.name());
        let result = async {
            let mut spec = MergeSpec::new(record).qualifiers(qualifiers.iter().cloned());
            if self.planner().needs_key_columns(entity, qualifiers) {
                spec.key_columns = self.key_columns(entity.table()).await?;
            }
            let statement = self.planner().merge(&mut pipeline, entity, spec.clone())?;
            let rows = self.execute(&mut pipeline, &statement, tx).await?;
            self.planner().merge_result(entity, &spec, &rows)
        }
        .await;
        pipeline.finish(result)
    }

    async fn key_columns(&self, table: &TableName) -> QueryResult<Vec<String>> {
        if let Some(keys) = self.key_cache.get(table) {
            return Ok(keys.clone());
        }
        let keys = self.connection.key_columns_async(table).await?;
        self.key_cache.insert(table.clone(), keys.clone());
        Ok(keys)
    }
}
