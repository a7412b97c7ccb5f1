//! SQLite executor.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::InterruptHandle;
use tracing::{debug, trace};

use super::{AsyncConnection, CancellationSignal, Connection, ExecResult, ExecutionError};
use crate::entity::TableName;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::statement::{CompiledStatement, Parameter};
use crate::value::{Record, Value};

type Shared = Arc<Mutex<rusqlite::Connection>>;

/// Progress of one async call, guarded so that an interrupt is only sent
/// while that call owns the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Queued,
    Running,
    Finished,
    /// Cancelled before it reached the connection.
    Abandoned,
}

/// A shared SQLite connection.
///
/// Clones refer to the same database handle. Statements are serialized on
/// an internal lock.
#[derive(Clone)]
pub struct SqliteConnection {
    inner: Shared,
    interrupt: Arc<InterruptHandle>,
}

impl SqliteConnection {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> ExecResult<Self> {
        Ok(Self::wrap(rusqlite::Connection::open(path)?))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> ExecResult<Self> {
        Ok(Self::wrap(rusqlite::Connection::open_in_memory()?))
    }

    fn wrap(conn: rusqlite::Connection) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            inner: Arc::new(Mutex::new(conn)),
            interrupt,
        }
    }

    /// Run one or more statements without parameters (schema setup, seeding).
    pub fn execute_batch(&self, sql: &str) -> ExecResult<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Start a transaction. It rolls back on drop unless committed.
    pub fn begin(&self) -> ExecResult<SqliteTransaction> {
        self.lock()?.execute_batch("BEGIN")?;
        debug!("transaction started");
        Ok(SqliteTransaction {
            conn: Arc::clone(&self.inner),
            finished: false,
        })
    }

    fn lock(&self) -> ExecResult<MutexGuard<'_, rusqlite::Connection>> {
        self.inner.lock().map_err(|_| ExecutionError::Poisoned)
    }

    fn check_owner(&self, tx: Option<&SqliteTransaction>) -> ExecResult<()> {
        match tx {
            Some(tx) if !Arc::ptr_eq(&tx.conn, &self.inner) => {
                Err(ExecutionError::ForeignTransaction)
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

impl Connection for SqliteConnection {
    type Transaction = SqliteTransaction;

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn fetch(
        &self,
        statement: &CompiledStatement,
        tx: Option<&SqliteTransaction>,
    ) -> ExecResult<Vec<Record>> {
        self.check_owner(tx)?;
        run(&*self.lock()?, statement)
    }

    fn key_columns(&self, table: &TableName) -> ExecResult<Vec<String>> {
        let quote = |s: &str| Dialect::Sqlite.quote_identifier(s);
        let sql = match &table.schema {
            Some(schema) => format!("PRAGMA {}.table_info({})", quote(schema), quote(&table.name)),
            None => format!("PRAGMA table_info({})", quote(&table.name)),
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        // Columns: cid, name, type, notnull, dflt_value, pk (1-based key position)
        let mut keys = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(5)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        keys.retain(|(position, _)| *position > 0);
        keys.sort_by_key(|(position, _)| *position);

        let keys: Vec<String> = keys.into_iter().map(|(_, name)| name).collect();
        trace!(table = %table, keys = ?keys, "key columns");
        Ok(keys)
    }
}

#[async_trait]
impl AsyncConnection for SqliteConnection {
    type Transaction = SqliteTransaction;

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_async(
        &self,
        statement: &CompiledStatement,
        tx: Option<&SqliteTransaction>,
        cancel: &CancellationSignal,
    ) -> ExecResult<Vec<Record>> {
        if cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        self.check_owner(tx)?;

        let inner = Arc::clone(&self.inner);
        let statement = statement.clone();
        let signal = cancel.clone();
        let state = Arc::new(Mutex::new(CallState::Queued));
        let task_state = Arc::clone(&state);
        let mut task = tokio::task::spawn_blocking(move || {
            let conn = inner.lock().map_err(|_| ExecutionError::Poisoned)?;
            {
                let mut state = task_state.lock().map_err(|_| ExecutionError::Poisoned)?;
                if *state == CallState::Abandoned || signal.is_cancelled() {
                    return Err(ExecutionError::Cancelled);
                }
                *state = CallState::Running;
            }
            let result = run(&conn, &statement);
            // Leave `Running` while the connection is still held, so an
            // interrupt can only land on this call's statement.
            if let Ok(mut state) = task_state.lock() {
                *state = CallState::Finished;
            }
            drop(conn);
            result
        });

        tokio::select! {
            joined = &mut task => joined?,
            _ = cancel.cancelled() => {
                let owns_connection = {
                    let mut state = state.lock().map_err(|_| ExecutionError::Poisoned)?;
                    match *state {
                        CallState::Queued => {
                            *state = CallState::Abandoned;
                            false
                        }
                        CallState::Running => {
                            self.interrupt.interrupt();
                            debug!("statement interrupted");
                            true
                        }
                        CallState::Finished | CallState::Abandoned => true,
                    }
                };
                if !owns_connection {
                    // Another caller holds the connection; the queued task
                    // gives up once it gets the lock.
                    return Err(ExecutionError::Cancelled);
                }
                // The statement may have completed before the interrupt landed;
                // its outcome stands.
                match task.await? {
                    Err(ExecutionError::Sqlite(e))
                        if e.sqlite_error_code() == Some(rusqlite::ErrorCode::OperationInterrupted) =>
                    {
                        Err(ExecutionError::Cancelled)
                    }
                    other => other,
                }
            }
        }
    }

    async fn key_columns_async(&self, table: &TableName) -> ExecResult<Vec<String>> {
        let this = self.clone();
        let table = table.clone();
        tokio::task::spawn_blocking(move || Connection::key_columns(&this, &table)).await?
    }
}

/// An open SQLite transaction.
///
/// Pass it to `fetch` to run statements inside it. Dropping it without
/// [`commit`](Self::commit) rolls back.
pub struct SqliteTransaction {
    conn: Shared,
    finished: bool,
}

impl SqliteTransaction {
    pub fn commit(mut self) -> ExecResult<()> {
        self.finished = true;
        self.finish("COMMIT")
    }

    pub fn rollback(mut self) -> ExecResult<()> {
        self.finished = true;
        self.finish("ROLLBACK")
    }

    fn finish(&self, sql: &str) -> ExecResult<()> {
        let conn = self.conn.lock().map_err(|_| ExecutionError::Poisoned)?;
        conn.execute_batch(sql)?;
        debug!(action = sql, "transaction finished");
        Ok(())
    }
}

impl fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("finished", &self.finished)
            .finish()
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(conn) = self.conn.lock() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                debug!(error = %e, "rollback on drop failed");
            }
        }
    }
}

fn run(conn: &rusqlite::Connection, statement: &CompiledStatement) -> ExecResult<Vec<Record>> {
    trace!(
        sql = statement.sql(),
        parameters = statement.parameters().len(),
        "executing"
    );

    let mut stmt = conn.prepare(statement.sql())?;
    let dialect = statement.dialect();
    for (i, param) in statement.parameters().iter().enumerate() {
        let index = match dialect {
            // Anonymous `?` placeholders bind by position
            Dialect::MySql => i + 1,
            _ => stmt
                .parameter_index(&dialect.parameter_placeholder(&param.name, i))?
                .ok_or_else(|| ExecutionError::UnboundParameter(param.name.clone()))?,
        };
        stmt.raw_bind_parameter(index, to_sql(param)?)?;
    }

    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.raw_query();
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            record.push(name.as_str(), from_sql(row.get_ref(i)?));
        }
        records.push(record);
    }
    trace!(rows = records.len(), "fetched");
    Ok(records)
}

/// Convert a parameter for binding, coercing it to its declared type.
fn to_sql(param: &Parameter) -> ExecResult<SqlValue> {
    let value = match (&param.value, param.db_type) {
        (Value::Null, _) => SqlValue::Null,
        (Value::List(_), _) => {
            return Err(ExecutionError::UnsupportedValue {
                name: param.name.clone(),
                reason: "lists are bound one element per parameter",
            })
        }
        (Value::Bytes(b), _) => SqlValue::Blob(b.clone()),
        (v, Some(t)) if t.is_textual() => SqlValue::Text(as_text(v)),
        (Value::Text(s), Some(t)) if t.is_integral() => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(s.clone())),
        (Value::Text(s), Some(t)) if t.is_floating() => s
            .trim()
            .parse::<f64>()
            .map(SqlValue::Real)
            .unwrap_or_else(|_| SqlValue::Text(s.clone())),
        (Value::Int(n), Some(t)) if t.is_floating() => SqlValue::Real(*n as f64),
        (Value::Float(f), Some(t)) if t.is_integral() && f.fract() == 0.0 => {
            SqlValue::Integer(*f as i64)
        }
        (Value::Bool(b), _) => SqlValue::Integer(i64::from(*b)),
        (Value::Int(n), _) => SqlValue::Integer(*n),
        (Value::Float(f), _) => SqlValue::Real(*f),
        (Value::Text(s), _) => SqlValue::Text(s.clone()),
    };
    Ok(value)
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => ryu::Buffer::new().format(*f).to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("{:?}", other),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}
