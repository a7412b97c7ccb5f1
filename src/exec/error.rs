//! Execution error types.

use thiserror::Error;

/// Result type for execution.
pub type ExecResult<T> = Result<T, ExecutionError>;

/// Errors raised while running a compiled statement.
///
/// Driver failures are carried unmodified and never retried.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Error reported by SQLite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// A transaction was handed to a connection that did not open it.
    #[error("transaction belongs to a different connection")]
    ForeignTransaction,

    /// The SQL text has no placeholder for a parameter.
    #[error("parameter '{0}' has no placeholder in the statement")]
    UnboundParameter(String),

    /// A value the driver cannot bind.
    #[error("cannot bind parameter '{name}': {reason}")]
    UnsupportedValue { name: String, reason: &'static str },

    /// The blocking task running the statement failed.
    #[error("execution task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The connection lock was poisoned by a panicking holder.
    #[error("connection lock poisoned")]
    Poisoned,
}

impl ExecutionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Cancelled)
    }
}
