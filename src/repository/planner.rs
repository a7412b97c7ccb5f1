//! SQL generation shared by the blocking and async repositories.
//!
//! Everything here runs before I/O: both repository flavours call the same
//! functions, so identical inputs yield byte-identical statements.

use tracing::debug;

use super::pipeline::{Pipeline, Stage};
use super::{QueryOptions, RepositoryOptions};
use crate::entity::{EntityDefinition, FromRecord};
use crate::error::{QueryError, QueryResult};
use crate::filter::{Field, Filter, Normalizer, OrderField, QueryGroup};
use crate::paging::PageSpec;
use crate::sql::dialect::{Dialect, SqlDialect, UpsertStyle};
use crate::statement::{
    resolve_keys, CompiledStatement, MergeSpec, Operation, StatementBuilder, StatementRequest,
    COUNT_ALIAS,
};
use crate::types::TypeResolutionChain;
use crate::value::{Record, Value};

pub(crate) struct Planner<'a> {
    builder: StatementBuilder<'a>,
    normalizer: Normalizer,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(
        dialect: Dialect,
        types: &'a TypeResolutionChain,
        options: &RepositoryOptions,
    ) -> Self {
        let build = options.build_options();
        Self {
            builder: StatementBuilder::new(dialect, types).with_options(build),
            normalizer: Normalizer::new(build.field_case),
        }
    }

    fn normalize(
        &self,
        pipeline: &mut Pipeline,
        filter: Option<Filter>,
        entity: &EntityDefinition,
    ) -> QueryResult<QueryGroup> {
        pipeline.advance(Stage::Normalizing);
        match filter {
            Some(filter) => self.normalizer.normalize(filter, entity),
            None => Ok(QueryGroup::default()),
        }
    }

    fn build(
        &self,
        pipeline: &mut Pipeline,
        request: StatementRequest<'_>,
    ) -> QueryResult<CompiledStatement> {
        pipeline.advance(Stage::Building);
        self.builder.build(&request)
    }

    pub(crate) fn query(
        &self,
        pipeline: &mut Pipeline,
        entity: &EntityDefinition,
        filter: Option<Filter>,
        options: &QueryOptions,
    ) -> QueryResult<CompiledStatement> {
        let group = self.normalize(pipeline, filter, entity)?;
        let request = StatementRequest::new(entity, Operation::Query)
            .columns(options.columns.clone())
            .filter(group)
            .order_by(options.order_by.clone())
            .top(options.top)
            .hints(options.hints.clone());
        self.build(pipeline, request)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn batch_query(
        &self,
        pipeline: &mut Pipeline,
        entity: &EntityDefinition,
        page: u64,
        rows_per_batch: u64,
        order_by: &[OrderField],
        filter: Option<Filter>,
        hints: Option<&str>,
    ) -> QueryResult<CompiledStatement> {
        let page = PageSpec::new(page, rows_per_batch)?;
        let group = self.normalize(pipeline, filter, entity)?;
        let request = StatementRequest::new(entity, Operation::BatchQuery(page))
            .filter(group)
            .order_by(order_by.to_vec())
            .hints(hints);
        self.build(pipeline, request)
    }

    pub(crate) fn count(
        &self,
        pipeline: &mut Pipeline,
        entity: &EntityDefinition,
        filter: Option<Filter>,
        hints: Option<&str>,
    ) -> QueryResult<CompiledStatement> {
        let group = self.normalize(pipeline, filter, entity)?;
        let request = StatementRequest::new(entity, Operation::Count)
            .filter(group)
            .hints(hints);
        self.build(pipeline, request)
    }

    pub(crate) fn merge(
        &self,
        pipeline: &mut Pipeline,
        entity: &EntityDefinition,
        spec: MergeSpec,
    ) -> QueryResult<CompiledStatement> {
        // Nothing to normalize: the record is the whole input.
        self.build(pipeline, StatementRequest::new(entity, Operation::Merge(spec)))
    }

    /// Whether a merge has to ask the connection for key columns: to default
    /// the qualifiers, or to check explicit ones where the dialect matches on
    /// the table key.
    pub(crate) fn needs_key_columns(&self, entity: &EntityDefinition, qualifiers: &[Field]) -> bool {
        entity.key_properties().is_empty()
            && (qualifiers.is_empty()
                || matches!(self.builder.dialect().upsert_style(), UpsertStyle::OnDuplicateKey))
    }

    /// The merge result: the value the database returned, else the
    /// identity/key value supplied in the record, else `Null`.
    pub(crate) fn merge_result(
        &self,
        entity: &EntityDefinition,
        spec: &MergeSpec,
        rows: &[Record],
    ) -> QueryResult<Value> {
        if let Some(value) = rows.first().and_then(Record::first) {
            if !value.is_null() {
                return Ok(value.clone());
            }
        }

        let scope = self.builder.scope(entity);
        let keys = resolve_keys(&scope, spec)?;
        let supplied = keys.result.and_then(|result| {
            spec.record
                .iter()
                .find(|(name, _)| scope.column(name, None).name == result)
                .map(|(_, value)| value.clone())
        });
        debug!(returned = !rows.is_empty(), "merge result taken from record");
        Ok(supplied.unwrap_or(Value::Null))
    }
}

pub(crate) fn map_rows<T: FromRecord>(rows: &[Record]) -> QueryResult<Vec<T>> {
    rows.iter()
        .map(|row| T::from_record(row).map_err(QueryError::from))
        .collect()
}

pub(crate) fn count_of(rows: &[Record]) -> QueryResult<u64> {
    let count: i64 = rows
        .first()
        .ok_or_else(|| crate::entity::MappingError::MissingColumn(COUNT_ALIAS.to_string()))?
        .get_as(COUNT_ALIAS)?;
    Ok(count.max(0) as u64)
}
