//! The condition model: single-column conditions and boolean groups.

use serde::{Deserialize, Serialize};

use super::field::Field;
use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// Comparison operator of a [`QueryField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[serde(alias = "eq")]
    Equal,
    #[serde(alias = "ne")]
    NotEqual,
    #[serde(alias = "gt")]
    GreaterThan,
    #[serde(alias = "gte")]
    GreaterThanOrEqual,
    #[serde(alias = "lt")]
    LessThan,
    #[serde(alias = "lte")]
    LessThanOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// The operator selecting exactly the complement (modulo NULLs).
    pub fn negate(self) -> Operator {
        match self {
            Operator::Equal => Operator::NotEqual,
            Operator::NotEqual => Operator::Equal,
            Operator::GreaterThan => Operator::LessThanOrEqual,
            Operator::GreaterThanOrEqual => Operator::LessThan,
            Operator::LessThan => Operator::GreaterThanOrEqual,
            Operator::LessThanOrEqual => Operator::GreaterThan,
            Operator::Like => Operator::NotLike,
            Operator::NotLike => Operator::Like,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::Between => Operator::NotBetween,
            Operator::NotBetween => Operator::Between,
            Operator::IsNull => Operator::IsNotNull,
            Operator::IsNotNull => Operator::IsNull,
        }
    }
}

/// Escape character for patterns built from literal text.
pub const LIKE_ESCAPE: char = '!';

/// Escape `text` so that, under `ESCAPE '!'`, it matches only itself.
///
/// `[` is escaped as well since T-SQL treats it as a wildcard.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '[') || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// A single column condition.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryField {
    pub field: Field,
    pub operator: Operator,
    pub value: Value,
    /// Escape character of a `LIKE` pattern, rendered as `ESCAPE '<c>'`.
    pub escape: Option<char>,
}

impl QueryField {
    pub fn new(field: impl Into<Field>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            escape: None,
        }
    }

    pub fn eq(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equal, value)
    }

    pub fn ne(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::NotEqual, value)
    }

    pub fn gt(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::GreaterThan, value)
    }

    pub fn gte(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::GreaterThanOrEqual, value)
    }

    pub fn lt(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::LessThan, value)
    }

    pub fn lte(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::LessThanOrEqual, value)
    }

    pub fn like(field: impl Into<Field>, pattern: impl Into<String>) -> Self {
        Self::new(field, Operator::Like, pattern.into())
    }

    pub fn not_like(field: impl Into<Field>, pattern: impl Into<String>) -> Self {
        Self::new(field, Operator::NotLike, pattern.into())
    }

    /// Declare the escape character used in this condition's pattern.
    pub fn with_escape(mut self, escape: char) -> Self {
        self.escape = Some(escape);
        self
    }

    pub fn in_list<V: Into<Value>>(
        field: impl Into<Field>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::new(field, Operator::In, Value::List(values))
    }

    pub fn not_in<V: Into<Value>>(
        field: impl Into<Field>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::new(field, Operator::NotIn, Value::List(values))
    }

    pub fn between(
        field: impl Into<Field>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::new(
            field,
            Operator::Between,
            Value::List(vec![low.into(), high.into()]),
        )
    }

    pub fn not_between(
        field: impl Into<Field>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::new(
            field,
            Operator::NotBetween,
            Value::List(vec![low.into(), high.into()]),
        )
    }

    pub fn is_null(field: impl Into<Field>) -> Self {
        Self::new(field, Operator::IsNull, Value::Null)
    }

    pub fn is_not_null(field: impl Into<Field>) -> Self {
        Self::new(field, Operator::IsNotNull, Value::Null)
    }

    /// Same field and value, complementary operator.
    pub fn negated(mut self) -> Self {
        self.operator = self.operator.negate();
        self
    }

    /// Check the value cardinality the operator requires.
    pub fn validate(&self) -> QueryResult<()> {
        let reason = match (self.operator, &self.value) {
            (Operator::In | Operator::NotIn, Value::List(items)) => {
                if items.iter().any(|v| matches!(v, Value::List(_))) {
                    Some("list elements must be scalar values")
                } else {
                    None
                }
            }
            (Operator::In | Operator::NotIn, _) => Some("a sequence of values is required"),
            (Operator::Between | Operator::NotBetween, Value::List(items)) => {
                if items.len() != 2 {
                    Some("exactly two values are required")
                } else if items.iter().any(|v| matches!(v, Value::List(_) | Value::Null)) {
                    Some("range bounds must be non-null scalar values")
                } else {
                    None
                }
            }
            (Operator::Between | Operator::NotBetween, _) => {
                Some("exactly two values are required")
            }
            (Operator::IsNull | Operator::IsNotNull, Value::Null) => None,
            (Operator::IsNull | Operator::IsNotNull, _) => Some("no value is allowed"),
            (_, Value::List(_)) => Some("a single value is required"),
            _ => None,
        };
        match reason {
            Some(reason) => Err(QueryError::InvalidOperatorArgument {
                field: self.field.name().to_string(),
                operator: self.operator,
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Boolean connective of a [`QueryGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

/// A child of a [`QueryGroup`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    Field(QueryField),
    Group(QueryGroup),
}

impl From<QueryField> for ConditionNode {
    fn from(field: QueryField) -> Self {
        ConditionNode::Field(field)
    }
}

impl From<QueryGroup> for ConditionNode {
    fn from(group: QueryGroup) -> Self {
        ConditionNode::Group(group)
    }
}

/// A boolean composition of conditions and nested groups.
///
/// Children are owned, so the structure is always a tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryGroup {
    pub conjunction: Conjunction,
    pub children: Vec<ConditionNode>,
    pub negated: bool,
}

impl QueryGroup {
    pub fn new(conjunction: Conjunction) -> Self {
        Self {
            conjunction,
            children: Vec::new(),
            negated: false,
        }
    }

    pub fn and(children: impl IntoIterator<Item = impl Into<ConditionNode>>) -> Self {
        Self::new(Conjunction::And).with_all(children)
    }

    pub fn or(children: impl IntoIterator<Item = impl Into<ConditionNode>>) -> Self {
        Self::new(Conjunction::Or).with_all(children)
    }

    pub fn push(&mut self, child: impl Into<ConditionNode>) -> &mut Self {
        self.children.push(child.into());
        self
    }

    pub fn with(mut self, child: impl Into<ConditionNode>) -> Self {
        self.push(child);
        self
    }

    pub fn with_all(mut self, children: impl IntoIterator<Item = impl Into<ConditionNode>>) -> Self {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Toggle `NOT (...)` around the group.
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Leaf conditions, depth-first, left to right.
    pub fn fields(&self) -> Vec<&QueryField> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a QueryField>) {
        for child in &self.children {
            match child {
                ConditionNode::Field(field) => out.push(field),
                ConditionNode::Group(group) => group.collect_fields(out),
            }
        }
    }

    /// Validate every leaf's operator arguments.
    pub fn validate(&self) -> QueryResult<()> {
        self.fields().into_iter().try_for_each(QueryField::validate)
    }
}
