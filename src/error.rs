//! Query pipeline error types.

use thiserror::Error;

use crate::entity::MappingError;
use crate::exec::ExecutionError;
use crate::filter::Operator;
use crate::sql::dialect::Dialect;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced by query construction and execution.
///
/// Every failure before execution is raised without touching the
/// connection.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The filter value has no supported interpretation.
    #[error("unsupported filter shape: {0}")]
    UnsupportedFilterShape(String),

    /// A predicate node outside the accepted grammar.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// An operator received a value of the wrong cardinality.
    #[error("invalid argument for {operator:?} on '{field}': {reason}")]
    InvalidOperatorArgument {
        field: String,
        operator: Operator,
        reason: &'static str,
    },

    /// An `IN` / `NOT IN` condition with no elements.
    #[error("IN list for '{field}' is empty")]
    EmptyInClause { field: String },

    /// An upsert with no explicit qualifiers on an entity without keys.
    #[error("no qualifier available to merge into '{table}'")]
    NoQualifierAvailable { table: String },

    /// A merge qualifier names a field the merged record does not carry.
    #[error("qualifier '{field}' is not a member of the merged record")]
    UnknownQualifier { field: String },

    /// The dialect matches upserts on the table's keys and cannot honour
    /// these qualifiers.
    #[error("{dialect} upserts match on the table key; qualifiers ({qualifiers}) are not that key")]
    QualifierNotKey { dialect: Dialect, qualifiers: String },

    /// A merged record member holds a list, which has no column form.
    #[error("merge value for '{field}' is a list")]
    MergeListValue { field: String },

    /// Non-positive page size or an offset that overflows.
    #[error("invalid paging arguments: {0}")]
    InvalidPageArgument(String),

    /// Paging requested without ordering where ordering is required.
    #[error("paging on {dialect} requires at least one ORDER BY field")]
    MissingOrderForPaging { dialect: Dialect },

    /// Replacement values do not line up with a statement's parameters.
    #[error("statement has {expected} parameters, {actual} values given")]
    ParameterCount { expected: usize, actual: usize },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
