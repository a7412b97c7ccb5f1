//! Statement execution.
//!
//! The query pipeline only needs two things from a database: run a compiled
//! statement and hand back rows, and (optionally) report the key columns of a
//! table. [`Connection`] is the blocking form, [`AsyncConnection`] the async
//! one. Both receive the caller's transaction handle untouched.
//!
//! [`SqliteConnection`] implements both on top of `rusqlite`.

mod cancel;
mod error;
mod sqlite;

pub use cancel::CancellationSignal;
pub use error::{ExecResult, ExecutionError};
pub use sqlite::{SqliteConnection, SqliteTransaction};

use async_trait::async_trait;

use crate::entity::TableName;
use crate::sql::dialect::Dialect;
use crate::statement::CompiledStatement;
use crate::value::Record;

/// Blocking statement execution.
pub trait Connection {
    /// Opaque transaction handle passed through to [`fetch`](Self::fetch).
    type Transaction;

    /// Dialect the connection speaks.
    fn dialect(&self) -> Dialect;

    /// Run a statement and return every row it produced, in order.
    fn fetch(
        &self,
        statement: &CompiledStatement,
        tx: Option<&Self::Transaction>,
    ) -> ExecResult<Vec<Record>>;

    /// Primary key columns of a table, in key order. Connections without
    /// metadata access report none.
    fn key_columns(&self, _table: &TableName) -> ExecResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Async statement execution with cooperative cancellation.
#[async_trait]
pub trait AsyncConnection: Send + Sync {
    type Transaction: Send + Sync;

    fn dialect(&self) -> Dialect;

    /// Run a statement in exactly one round trip. Fails with
    /// [`ExecutionError::Cancelled`] once `cancel` fires.
    async fn fetch_async(
        &self,
        statement: &CompiledStatement,
        tx: Option<&Self::Transaction>,
        cancel: &CancellationSignal,
    ) -> ExecResult<Vec<Record>>;

    async fn key_columns_async(&self, _table: &TableName) -> ExecResult<Vec<String>> {
        Ok(Vec::new())
    }
}
