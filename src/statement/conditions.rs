//! WHERE clause rendering.

use super::compiled::ParameterSet;
use super::Scope;
use crate::error::{QueryError, QueryResult};
use crate::filter::{ConditionNode, Conjunction, Operator, QueryField, QueryGroup};
use crate::sql::token::{Token, TokenStream};
use crate::value::{Value, ValueKind};

/// Render a condition tree. Returns `None` when the tree holds no leaf.
/// An empty negated group selects nothing and renders as `1 = 0`.
///
/// Parameters are bound depth-first, left to right, so every leaf gets its
/// own names even when the same field appears twice.
pub(crate) fn render_group(
    scope: &Scope<'_>,
    group: &QueryGroup,
    params: &mut ParameterSet,
) -> QueryResult<Option<TokenStream>> {
    render_nested(scope, group, params, false)
}

fn render_nested(
    scope: &Scope<'_>,
    group: &QueryGroup,
    params: &mut ParameterSet,
    nested: bool,
) -> QueryResult<Option<TokenStream>> {
    let mut parts = Vec::with_capacity(group.children.len());
    for child in &group.children {
        match child {
            ConditionNode::Field(field) => parts.push(render_field(scope, field, params)?),
            ConditionNode::Group(inner) => {
                if let Some(ts) = render_nested(scope, inner, params, true)? {
                    parts.push(ts);
                }
            }
        }
    }
    if parts.is_empty() {
        if !group.negated {
            return Ok(None);
        }
        let mut ts = TokenStream::new();
        ts.push(Token::LitInt(1))
            .space()
            .push(Token::Eq)
            .space()
            .push(Token::LitInt(0));
        return Ok(Some(ts));
    }

    let wrap = group.negated || (nested && parts.len() > 1);
    let conjunction = match group.conjunction {
        Conjunction::And => Token::And,
        Conjunction::Or => Token::Or,
    };

    let mut ts = TokenStream::new();
    if group.negated {
        ts.push(Token::Not).space();
    }
    if wrap {
        ts.lparen();
    }
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            ts.space().push(conjunction.clone()).space();
        }
        ts.append(part);
    }
    if wrap {
        ts.rparen();
    }
    Ok(Some(ts))
}

fn render_field(
    scope: &Scope<'_>,
    condition: &QueryField,
    params: &mut ParameterSet,
) -> QueryResult<TokenStream> {
    condition.validate()?;

    let kind = condition
        .field
        .kind()
        .or_else(|| value_kind(&condition.value));
    let column = scope.column(condition.field.name(), kind);
    let db_type = column.db_type;

    let mut ts = TokenStream::new();
    ts.ident(column.name).space();

    match condition.operator {
        Operator::IsNull => {
            ts.push(Token::IsNull);
        }
        Operator::IsNotNull => {
            ts.push(Token::IsNotNull);
        }
        Operator::Equal if condition.value.is_null() => {
            ts.push(Token::IsNull);
        }
        Operator::NotEqual if condition.value.is_null() => {
            ts.push(Token::IsNotNull);
        }
        Operator::In | Operator::NotIn => {
            let items = list(condition)?;
            if items.is_empty() {
                return Err(QueryError::EmptyInClause {
                    field: condition.field.name().to_string(),
                });
            }
            if condition.operator == Operator::NotIn {
                ts.push(Token::Not).space();
            }
            let bound: Vec<TokenStream> = items
                .iter()
                .map(|v| params.bind(v.clone(), db_type).into())
                .collect();
            ts.push(Token::In)
                .space()
                .lparen()
                .comma_separated(bound)
                .rparen();
        }
        Operator::Between | Operator::NotBetween => {
            let (low, high) = match list(condition)? {
                [low, high] => (low.clone(), high.clone()),
                _ => {
                    return Err(QueryError::InvalidOperatorArgument {
                        field: condition.field.name().to_string(),
                        operator: condition.operator,
                        reason: "exactly two values are required",
                    })
                }
            };
            if condition.operator == Operator::NotBetween {
                ts.push(Token::Not).space();
            }
            ts.push(Token::Between)
                .space()
                .push(params.bind(low, db_type))
                .space()
                .push(Token::And)
                .space()
                .push(params.bind(high, db_type));
        }
        Operator::NotLike => {
            ts.push(Token::Not)
                .space()
                .push(Token::Like)
                .space()
                .push(params.bind(condition.value.clone(), db_type));
        }
        op => {
            ts.push(comparison(op))
                .space()
                .push(params.bind(condition.value.clone(), db_type));
        }
    }
    if let (Operator::Like | Operator::NotLike, Some(escape)) = (condition.operator, condition.escape)
    {
        ts.space()
            .push(Token::Escape)
            .space()
            .push(Token::LitStr(escape.to_string()));
    }
    Ok(ts)
}

fn comparison(op: Operator) -> Token {
    match op {
        Operator::NotEqual => Token::Ne,
        Operator::GreaterThan => Token::Gt,
        Operator::GreaterThanOrEqual => Token::Gte,
        Operator::LessThan => Token::Lt,
        Operator::LessThanOrEqual => Token::Lte,
        Operator::Like => Token::Like,
        _ => Token::Eq,
    }
}

fn list(condition: &QueryField) -> QueryResult<&[Value]> {
    match &condition.value {
        Value::List(items) => Ok(items),
        _ => Err(QueryError::InvalidOperatorArgument {
            field: condition.field.name().to_string(),
            operator: condition.operator,
            reason: "a sequence of values is required",
        }),
    }
}

/// Kind of a bound value; lists report their first non-null element.
fn value_kind(value: &Value) -> Option<ValueKind> {
    match value {
        Value::List(items) => items.iter().find_map(Value::kind),
        other => other.kind(),
    }
}
