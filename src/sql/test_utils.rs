//! Parse-checks for generated SQL in unit tests.

use sqlparser::dialect::{MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;
use crate::statement::CompiledStatement;

fn parser_dialect(dialect: Dialect) -> Box<dyn sqlparser::dialect::Dialect> {
    match dialect {
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
    }
}

/// Parse `sql` with the matching sqlparser dialect.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    Parser::parse_sql(&*parser_dialect(dialect), sql)
        .map(|_| ())
        .map_err(|e| format!("invalid SQL for {}: {}\nSQL: {}", dialect, e, sql))
}

/// Parse a compiled statement with its own dialect. `MERGE ... OUTPUT` is
/// outside what sqlparser accepts and is skipped.
pub fn assert_valid(statement: &CompiledStatement) {
    if statement.sql().starts_with("MERGE") {
        return;
    }
    if let Err(e) = validate_sql(statement.sql(), statement.dialect()) {
        panic!("{}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_sql() {
        assert!(validate_sql("SELECT \"Id\" FROM \"Customer\"", Dialect::Postgres).is_ok());
        assert!(validate_sql("SELEC Id FORM Customer", Dialect::MySql).is_err());
    }
}
