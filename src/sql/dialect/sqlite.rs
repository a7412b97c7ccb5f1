//! SQLite dialect.
//!
//! SQLite features:
//! - ANSI identifier quoting (`"`)
//! - `@name` parameters
//! - LIMIT ... OFFSET ... without a mandatory ORDER BY
//! - `INSERT ... ON CONFLICT (...) DO UPDATE` upserts (3.24+)
//! - RETURNING (3.35+)
//! - `INDEXED BY` / `NOT INDEXED` after the table in SELECT

use super::helpers;
use super::SqlDialect;

/// SQLite dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    // Uses default @name parameters, LIMIT ... OFFSET ..., ON CONFLICT
}
