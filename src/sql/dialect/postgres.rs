//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - `$n` positional parameters
//! - RETURNING clause
//! - ON CONFLICT for upserts
//! - No table hints; planner hint comments (pg_hint_plan) precede the statement

use super::helpers;
use super::{HintPosition, SqlDialect};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn parameter_placeholder(&self, _name: &str, index: usize) -> String {
        helpers::placeholder_dollar(index)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn hint_position(&self) -> HintPosition {
        HintPosition::StatementPrefix
    }

    fn supports_upsert_hints(&self) -> bool {
        true
    }
}
