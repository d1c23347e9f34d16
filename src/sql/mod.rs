//! Dialect-neutral SQL generation.

pub mod builder;
pub mod context;
pub mod expr;
pub mod statement;

pub use builder::{JoinClause, Sql, Updates};
pub use context::SqlContext;
pub use expr::{CompareOp, Predicate};
pub use statement::{IntoStatement, Statement};
