//! Compiled statements.

use std::fmt;

use serde::Serialize;

use crate::error::{QueryError, QueryResult};
use crate::sql::dialect::Dialect;
use crate::sql::token::Token;
use crate::types::DbType;
use crate::value::Value;

/// Name of the parameter bound at `index`.
pub fn parameter_name(index: usize) -> String {
    format!("p{}", index)
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<DbType>,
}

/// SQL text plus its ordered parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    dialect: Dialect,
    sql: String,
    parameters: Vec<Parameter>,
}

impl CompiledStatement {
    pub(crate) fn new(dialect: Dialect, sql: String, parameters: Vec<Parameter>) -> Self {
        Self {
            dialect,
            sql,
            parameters,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// The same statement with fresh values, in parameter order. Declared
    /// types are kept.
    pub fn with_values<I, V>(&self, values: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.len() != self.parameters.len() {
            return Err(QueryError::ParameterCount {
                expected: self.parameters.len(),
                actual: values.len(),
            });
        }
        let parameters = self
            .parameters
            .iter()
            .zip(values)
            .map(|(p, value)| Parameter {
                name: p.name.clone(),
                value,
                db_type: p.db_type,
            })
            .collect();
        Ok(Self {
            dialect: self.dialect,
            sql: self.sql.clone(),
            parameters,
        })
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Parameters collected while rendering one statement.
#[derive(Debug, Default)]
pub(crate) struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    /// Bind a value under the next parameter name and return its token.
    pub(crate) fn bind(&mut self, value: Value, db_type: Option<DbType>) -> Token {
        let index = self.params.len();
        let name = parameter_name(index);
        self.params.push(Parameter {
            name: name.clone(),
            value,
            db_type,
        });
        Token::Param { name, index }
    }

    pub(crate) fn into_vec(self) -> Vec<Parameter> {
        self.params
    }
}
