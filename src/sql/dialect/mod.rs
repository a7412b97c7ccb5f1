//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (SQLite/PG), `` ` `` (MySQL), `[]` (T-SQL)
//! - Parameter placeholders: `@p0` (SQLite/T-SQL), `$1` (PG), `?` (MySQL)
//! - Pagination: LIMIT/OFFSET vs OFFSET FETCH vs TOP
//! - Upserts: MERGE vs ON CONFLICT vs ON DUPLICATE KEY UPDATE
//! - Where table hints go
//!
//! # Usage
//!
//! ```ignore
//! use quarry::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```
//!
//! | Feature | SQLite | PostgreSQL | SQL Server | MySQL |
//! |---------|--------|-----------|------------|-------|
//! | Upsert | ON CONFLICT (3.24+) | ON CONFLICT (9.5+) | MERGE (2008+) | ON DUPLICATE KEY |
//! | RETURNING | 3.35+ | ✓ | OUTPUT | ❌ |
//! | TOP | ❌ | ❌ | ✓ | ❌ |
//! | Paging without ORDER BY | ✓ | ✓ | ❌ | ✓ |

pub mod helpers;
mod mysql;
mod postgres;
mod sqlite;
mod tsql;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use tsql::TSql;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;

/// Where a table-hint string is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintPosition {
    /// Directly after the table reference: `FROM t WITH (NOLOCK)`.
    AfterTable,
    /// In front of the whole statement: `/*+ SeqScan(t) */ SELECT ...`.
    StatementPrefix,
}

/// How an upsert is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// `MERGE ... USING ... WHEN MATCHED ... WHEN NOT MATCHED ...`
    Merge,
    /// `INSERT ... ON CONFLICT (...) DO UPDATE SET ...`
    OnConflict,
    /// `INSERT ... ON DUPLICATE KEY UPDATE ...`
    OnDuplicateKey,
}

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Placeholder text for a bound parameter.
    ///
    /// `name` is the deterministic parameter name (`p0`, `p1`, ...), `index`
    /// its zero-based position.
    fn parameter_placeholder(&self, name: &str, index: usize) -> String {
        let _ = index;
        helpers::placeholder_at(name)
    }

    /// Emit LIMIT/OFFSET or equivalent pagination clause.
    ///
    /// - SQLite/PostgreSQL/MySQL: `LIMIT n OFFSET m` (default)
    /// - T-SQL: `OFFSET m ROWS FETCH NEXT n ROWS ONLY` (override)
    fn emit_limit_offset(&self, limit: Option<i64>, offset: Option<i64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    /// Whether this dialect requires ORDER BY for OFFSET/LIMIT.
    ///
    /// T-SQL requires ORDER BY when using OFFSET FETCH.
    fn requires_order_by_for_offset(&self) -> bool {
        false
    }

    /// Whether a plain row limit is written as `SELECT TOP (n)`.
    fn supports_top(&self) -> bool {
        false
    }

    fn hint_position(&self) -> HintPosition {
        HintPosition::AfterTable
    }

    /// Whether table hints may follow the target table of an upsert.
    fn supports_upsert_hints(&self) -> bool {
        false
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }

    /// Whether this dialect supports RETURNING clause.
    fn supports_returning(&self) -> bool {
        true
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
    TSql,
    MySql,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::Postgres => &Postgres,
            Dialect::TSql => &TSql,
            Dialect::MySql => &MySql,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn parameter_placeholder(&self, name: &str, index: usize) -> String {
        self.dialect().parameter_placeholder(name, index)
    }

    fn emit_limit_offset(&self, limit: Option<i64>, offset: Option<i64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        self.dialect().requires_order_by_for_offset()
    }

    fn supports_top(&self) -> bool {
        self.dialect().supports_top()
    }

    fn hint_position(&self) -> HintPosition {
        self.dialect().hint_position()
    }

    fn supports_upsert_hints(&self) -> bool {
        self.dialect().supports_upsert_hints()
    }

    fn upsert_style(&self) -> UpsertStyle {
        self.dialect().upsert_style()
    }

    fn supports_returning(&self) -> bool {
        self.dialect().supports_returning()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "tsql" | "mssql" | "sqlserver" => Ok(Dialect::TSql),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            other => Err(format!("unknown dialect '{}'", other)),
        }
    }
}
