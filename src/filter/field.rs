//! Column references.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::value::ValueKind;

/// How field names given by callers are matched against entity metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCase {
    #[default]
    Exact,
    Insensitive,
}

impl FieldCase {
    pub fn matches(self, a: &str, b: &str) -> bool {
        match self {
            FieldCase::Exact => a == b,
            FieldCase::Insensitive => a.eq_ignore_ascii_case(b),
        }
    }
}

/// A column reference with an optional semantic type tag.
///
/// Equality and hashing consider the name only, exactly.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<ValueKind>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
        }
    }

    pub fn with_kind(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<ValueKind> {
        self.kind
    }

    /// Fields from a list of names.
    pub fn from_names<I, S>(names: I) -> Vec<Field>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(Field::new).collect()
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::new(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::new(name)
    }
}
