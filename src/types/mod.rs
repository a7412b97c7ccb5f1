//! Database type resolution.
//!
//! For every bound property the statement builder asks which [`DbType`] the
//! parameter should be declared as. The answer comes from, in order:
//!
//! 1. the property's own `db_type` annotation,
//! 2. a property-level mapping registered in the [`TypeMapper`]
//!    (`Entity.Property`),
//! 3. a type-level mapping for the property's [`ValueKind`](crate::value::ValueKind),
//!
//! and is `None` otherwise, meaning the driver infers the type from the
//! value. Results are cached per property identity in the
//! [`TypeResolutionChain`].

mod db_type;
mod mapper;
mod resolver;

pub use db_type::DbType;
pub use mapper::{PropertyKey, TypeMapper};
pub use resolver::{PropertyRef, Resolver, TypeMapResolver, TypeResolutionChain};
