//! # Quarry
//!
//! Typed query filters compiled to parameterized, multi-dialect SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Filter (record, condition(s), group, predicate, key)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [normalizer]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 QueryGroup (AND/OR tree)                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [statement builder + type resolution]
//! ┌─────────────────────────────────────────────────────────┐
//! │     CompiledStatement (SQL text + typed parameters)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [connection]
//! ┌─────────────────────────────────────────────────────────┐
//! │                Records → mapped entities                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`repository::Repository`] and [`repository::AsyncRepository`] drive the
//! whole pipeline; the stages are usable on their own.
//!
//! ## Trust boundary
//!
//! Values always travel as bound parameters. Table hints and the member
//! names of dynamic filter records are written into the SQL verbatim and must
//! come from trusted code.

pub mod config;
pub mod entity;
pub mod error;
pub mod exec;
pub mod filter;
pub mod paging;
pub mod repository;
pub mod sql;
pub mod statement;
pub mod types;
pub mod value;

pub use sql::dialect;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::dialect::{Dialect, SqlDialect};
    pub use crate::entity::{
        Entity, EntityDefinition, FromRecord, MappingError, Naming, PropertyDef, TableName,
    };
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::exec::{
        AsyncConnection, CancellationSignal, Connection, ExecutionError, SqliteConnection,
        SqliteTransaction,
    };
    pub use crate::filter::{
        // Predicate constructors
        constant,
        normalize,
        not,
        prop,
        // Types
        Conjunction,
        Direction,
        Field,
        FieldCase,
        Filter,
        Operator,
        OrderField,
        Predicate,
        PredicateExt,
        QueryField,
        QueryGroup,
    };
    pub use crate::paging::PageSpec;
    pub use crate::record;
    pub use crate::repository::{AsyncRepository, QueryOptions, Repository, RepositoryOptions};
    pub use crate::statement::{
        CompiledStatement, MergeSpec, Operation, StatementBuilder, StatementRequest,
    };
    pub use crate::types::{DbType, PropertyKey, TypeMapper, TypeResolutionChain};
    pub use crate::value::{FromValue, Record, Value, ValueKind};
}

// Also export at crate root for convenience
pub use dialect::Dialect;
pub use error::{QueryError, QueryResult};
pub use filter::{normalize, Filter, QueryField, QueryGroup};
pub use statement::{CompiledStatement, StatementBuilder};
pub use value::{Record, Value};
