//! SQL rendering.
//!
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use dialect::{Dialect, HintPosition, SqlDialect, UpsertStyle};
pub use token::{Token, TokenStream};
