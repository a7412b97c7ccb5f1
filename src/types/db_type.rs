//! Database parameter types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The database type a bound parameter is declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbType {
    AnsiString,
    Binary,
    Boolean,
    Byte,
    Currency,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Double,
    Guid,
    Int16,
    Int32,
    Int64,
    Single,
    String,
    Time,
    Xml,
}

impl DbType {
    /// Whether values of this type travel as text.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            DbType::AnsiString
                | DbType::String
                | DbType::Xml
                | DbType::Guid
                | DbType::Date
                | DbType::DateTime
                | DbType::DateTime2
                | DbType::DateTimeOffset
                | DbType::Time
        )
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            DbType::Boolean | DbType::Byte | DbType::Int16 | DbType::Int32 | DbType::Int64
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(
            self,
            DbType::Currency | DbType::Decimal | DbType::Double | DbType::Single
        )
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbType::AnsiString => "ansi_string",
            DbType::Binary => "binary",
            DbType::Boolean => "boolean",
            DbType::Byte => "byte",
            DbType::Currency => "currency",
            DbType::Date => "date",
            DbType::DateTime => "date_time",
            DbType::DateTime2 => "date_time2",
            DbType::DateTimeOffset => "date_time_offset",
            DbType::Decimal => "decimal",
            DbType::Double => "double",
            DbType::Guid => "guid",
            DbType::Int16 => "int16",
            DbType::Int32 => "int32",
            DbType::Int64 => "int64",
            DbType::Single => "single",
            DbType::String => "string",
            DbType::Time => "time",
            DbType::Xml => "xml",
        };
        f.write_str(name)
    }
}
