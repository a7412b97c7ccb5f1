//! Predicate expressions over entity properties.
//!
//! A [`Predicate`] is a small boolean expression tree built with the
//! [`prop`] / [`constant`] constructors and the [`PredicateExt`] combinators:
//!
//! ```ignore
//! use quarry::filter::{prop, PredicateExt};
//!
//! let p = prop("Id").gt(10).and(prop("Name").starts_with("A"));
//! ```
//!
//! The accepted grammar is deliberately narrow. Every comparison must have an
//! entity property on one side and a constant on the other; membership,
//! range and pattern tests are expressed as method calls. Anything else is
//! rejected with [`QueryError::UnsupportedExpression`] when the predicate is
//! compiled into a [`QueryGroup`].

use super::condition::{
    escape_like, Conjunction, ConditionNode, Operator, QueryField, QueryGroup, LIKE_ESCAPE,
};
use super::field::{Field, FieldCase};
use crate::entity::EntityDefinition;
use crate::error::{QueryError, QueryResult};
use crate::value::{Value, ValueKind};

/// Comparison operator in a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    /// The operator with its operands swapped: `5 < x` is `x > 5`.
    fn flip(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
        }
    }

    fn operator(self) -> Operator {
        match self {
            CompareOp::Eq => Operator::Equal,
            CompareOp::Ne => Operator::NotEqual,
            CompareOp::Lt => Operator::LessThan,
            CompareOp::Lte => Operator::LessThanOrEqual,
            CompareOp::Gt => Operator::GreaterThan,
            CompareOp::Gte => Operator::GreaterThanOrEqual,
        }
    }
}

/// A boolean expression over entity properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Property(String),
    Constant(Value),
    Compare {
        left: Box<Predicate>,
        op: CompareOp,
        right: Box<Predicate>,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// Method call: `contains`, `starts_with`, `ends_with`, `between`.
    Call {
        method: String,
        target: Box<Predicate>,
        args: Vec<Predicate>,
    },
}

/// Reference an entity property.
pub fn prop(name: impl Into<String>) -> Predicate {
    Predicate::Property(name.into())
}

/// A literal operand.
pub fn constant(value: impl Into<Value>) -> Predicate {
    Predicate::Constant(value.into())
}

/// Logical negation.
pub fn not(predicate: Predicate) -> Predicate {
    Predicate::Not(Box::new(predicate))
}

/// Combinators for building predicates fluently.
pub trait PredicateExt: Sized {
    fn compare(self, op: CompareOp, right: impl Into<Predicate>) -> Predicate;

    fn eq(self, right: impl Into<Predicate>) -> Predicate {
        self.compare(CompareOp::Eq, right)
    }

    fn ne(self, right: impl Into<Predicate>) -> Predicate {
        self.compare(CompareOp::Ne, right)
    }

    fn lt(self, right: impl Into<Predicate>) -> Predicate {
        self.compare(CompareOp::Lt, right)
    }

    fn lte(self, right: impl Into<Predicate>) -> Predicate {
        self.compare(CompareOp::Lte, right)
    }

    fn gt(self, right: impl Into<Predicate>) -> Predicate {
        self.compare(CompareOp::Gt, right)
    }

    fn gte(self, right: impl Into<Predicate>) -> Predicate {
        self.compare(CompareOp::Gte, right)
    }

    fn and(self, other: Predicate) -> Predicate;
    fn or(self, other: Predicate) -> Predicate;
    fn call(self, method: &str, args: Vec<Predicate>) -> Predicate;

    /// Membership in a constant collection.
    fn is_in(self, values: impl Into<Value>) -> Predicate;

    fn not_in(self, values: impl Into<Value>) -> Predicate {
        not(self.is_in(values))
    }

    fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
        self.call("between", vec![constant(low), constant(high)])
    }

    fn starts_with(self, prefix: impl Into<String>) -> Predicate {
        self.call("starts_with", vec![constant(prefix.into())])
    }

    fn ends_with(self, suffix: impl Into<String>) -> Predicate {
        self.call("ends_with", vec![constant(suffix.into())])
    }

    fn contains(self, needle: impl Into<String>) -> Predicate {
        self.call("contains", vec![constant(needle.into())])
    }

    fn is_null(self) -> Predicate {
        self.eq(Value::Null)
    }

    fn is_not_null(self) -> Predicate {
        self.ne(Value::Null)
    }
}

impl PredicateExt for Predicate {
    fn compare(self, op: CompareOp, right: impl Into<Predicate>) -> Predicate {
        Predicate::Compare {
            left: Box::new(self),
            op,
            right: Box::new(right.into()),
        }
    }

    fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    fn call(self, method: &str, args: Vec<Predicate>) -> Predicate {
        Predicate::Call {
            method: method.to_string(),
            target: Box::new(self),
            args,
        }
    }

    fn is_in(self, values: impl Into<Value>) -> Predicate {
        // Expressed the way a collection test reads: `values.contains(prop)`.
        Predicate::Call {
            method: "contains".to_string(),
            target: Box::new(constant(values)),
            args: vec![self],
        }
    }
}

macro_rules! impl_into_predicate {
    ($($t:ty),*) => {
        $(impl From<$t> for Predicate {
            fn from(v: $t) -> Self {
                Predicate::Constant(v.into())
            }
        })*
    };
}

impl_into_predicate!(Value, i32, i64, f64, bool, &str, String);

/// Compiles predicates against one entity definition.
pub(crate) struct PredicateCompiler<'a> {
    entity: &'a EntityDefinition,
    case: FieldCase,
}

impl<'a> PredicateCompiler<'a> {
    pub(crate) fn new(entity: &'a EntityDefinition, case: FieldCase) -> Self {
        Self { entity, case }
    }

    /// Compile to a group. A single leaf at the root is wrapped in an AND
    /// group.
    pub(crate) fn compile(&self, predicate: &Predicate) -> QueryResult<QueryGroup> {
        match self.node(predicate)? {
            ConditionNode::Group(group) => Ok(group),
            leaf @ ConditionNode::Field(_) => Ok(QueryGroup::new(Conjunction::And).with(leaf)),
        }
    }

    fn node(&self, predicate: &Predicate) -> QueryResult<ConditionNode> {
        match predicate {
            Predicate::And(left, right) => self.junction(Conjunction::And, left, right),
            Predicate::Or(left, right) => self.junction(Conjunction::Or, left, right),
            Predicate::Not(inner) => Ok(match self.node(inner)? {
                ConditionNode::Field(field) => ConditionNode::Field(field.negated()),
                ConditionNode::Group(group) => ConditionNode::Group(group.negate()),
            }),
            Predicate::Compare { left, op, right } => match (left.as_ref(), right.as_ref()) {
                (Predicate::Property(name), Predicate::Constant(value)) => {
                    self.comparison(name, *op, value)
                }
                (Predicate::Constant(value), Predicate::Property(name)) => {
                    self.comparison(name, op.flip(), value)
                }
                (Predicate::Property(a), Predicate::Property(b)) => {
                    Err(QueryError::UnsupportedExpression(format!(
                        "comparison between properties '{}' and '{}'",
                        a, b
                    )))
                }
                _ => Err(QueryError::UnsupportedExpression(
                    "comparison operands must be a property and a constant".to_string(),
                )),
            },
            Predicate::Property(name) => {
                let field = self.column(name)?;
                match self.entity.property(name, self.case) {
                    Some(p) if p.kind == ValueKind::Bool => {
                        Ok(QueryField::eq(field, true).into())
                    }
                    _ => Err(QueryError::UnsupportedExpression(format!(
                        "property '{}' is not boolean and cannot stand alone",
                        name
                    ))),
                }
            }
            Predicate::Constant(value) => Err(QueryError::UnsupportedExpression(format!(
                "bare constant {}",
                value
            ))),
            Predicate::Call {
                method,
                target,
                args,
            } => self.call(method, target, args),
        }
    }

    fn junction(
        &self,
        conjunction: Conjunction,
        left: &Predicate,
        right: &Predicate,
    ) -> QueryResult<ConditionNode> {
        let mut group = QueryGroup::new(conjunction);
        for side in [left, right] {
            match self.node(side)? {
                // Chains of the same connective flatten into one group.
                ConditionNode::Group(inner)
                    if inner.conjunction == conjunction && !inner.negated =>
                {
                    group.children.extend(inner.children)
                }
                other => group.children.push(other),
            }
        }
        Ok(group.into())
    }

    fn comparison(&self, name: &str, op: CompareOp, value: &Value) -> QueryResult<ConditionNode> {
        let field = self.column(name)?;
        let condition = match (op, value) {
            (CompareOp::Eq, Value::Null) => QueryField::is_null(field),
            (CompareOp::Ne, Value::Null) => QueryField::is_not_null(field),
            (_, Value::Null) => {
                return Err(QueryError::UnsupportedExpression(format!(
                    "ordering comparison of '{}' against null",
                    name
                )))
            }
            (_, Value::List(_)) => {
                return Err(QueryError::UnsupportedExpression(format!(
                    "comparison of '{}' against a collection",
                    name
                )))
            }
            (op, value) => QueryField::new(field, op.operator(), value.clone()),
        };
        Ok(condition.into())
    }

    fn call(&self, method: &str, target: &Predicate, args: &[Predicate]) -> QueryResult<ConditionNode> {
        let condition = match (method, target, args) {
            ("contains", Predicate::Constant(Value::List(items)), [Predicate::Property(name)]) => {
                QueryField::in_list(self.column(name)?, items.iter().cloned())
            }
            ("contains", Predicate::Property(name), [Predicate::Constant(Value::Text(s))]) => {
                QueryField::like(self.column(name)?, format!("%{}%", escape_like(s)))
                    .with_escape(LIKE_ESCAPE)
            }
            ("starts_with", Predicate::Property(name), [Predicate::Constant(Value::Text(s))]) => {
                QueryField::like(self.column(name)?, format!("{}%", escape_like(s)))
                    .with_escape(LIKE_ESCAPE)
            }
            ("ends_with", Predicate::Property(name), [Predicate::Constant(Value::Text(s))]) => {
                QueryField::like(self.column(name)?, format!("%{}", escape_like(s)))
                    .with_escape(LIKE_ESCAPE)
            }
            (
                "between",
                Predicate::Property(name),
                [Predicate::Constant(low), Predicate::Constant(high)],
            ) => QueryField::between(self.column(name)?, low.clone(), high.clone()),
            ("contains" | "starts_with" | "ends_with" | "between", _, _) => {
                return Err(QueryError::UnsupportedExpression(format!(
                    "unsupported operands for '{}'",
                    method
                )))
            }
            _ => {
                return Err(QueryError::UnsupportedExpression(format!(
                    "method '{}' is not translatable",
                    method
                )))
            }
        };
        Ok(condition.into())
    }

    fn column(&self, name: &str) -> QueryResult<Field> {
        self.entity
            .property(name, self.case)
            .map(|p| p.field())
            .ok_or_else(|| {
                QueryError::UnsupportedExpression(format!(
                    "'{}' is not a property of {}",
                    name,
                    self.entity.name()
                ))
            })
    }
}
