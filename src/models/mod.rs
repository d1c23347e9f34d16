//! Data models shared across sqlbridge.
//!
//! This module re-exports the value, row and connection types.

pub mod connection;
pub mod row;
pub mod value;

// Re-export commonly used types
pub use connection::{DatabaseType, masked_connection_string};
pub use row::Row;
pub use value::{FromValue, ToValue, Value};
