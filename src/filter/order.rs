//! ORDER BY specifications.

use serde::{Deserialize, Serialize};

use super::field::Field;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One ORDER BY term. A list of these breaks ties left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderField {
    pub field: Field,
    pub direction: Direction,
}

impl OrderField {
    pub fn new(field: impl Into<Field>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<Field>) -> Self {
        Self::new(field, Direction::Ascending)
    }

    pub fn desc(field: impl Into<Field>) -> Self {
        Self::new(field, Direction::Descending)
    }

    /// Parse `name`, `name:asc` or `name:desc`.
    pub fn parse(spec: &str) -> Option<Self> {
        let (name, dir) = match spec.split_once(':') {
            Some((name, dir)) => (name.trim(), dir.trim()),
            None => (spec.trim(), "asc"),
        };
        if name.is_empty() {
            return None;
        }
        let direction = match dir.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Direction::Ascending,
            "desc" | "descending" => Direction::Descending,
            _ => return None,
        };
        Some(Self::new(name, direction))
    }
}
