//! Database access layer.
//!
//! This module provides:
//! - The native driver seam (`Driver`, `NativeConnection`)
//! - The bundled sqlx driver for MySQL, PostgreSQL and SQLite
//! - Parameter binding and row decoding
//! - The decoration chain (profiler, retry policy)

#[macro_use]
pub mod macros;
pub mod decorate;
pub mod driver;
pub mod executor;
pub mod params;
pub mod pool;
pub mod profiler;
pub mod retry;
pub mod types;

pub use decorate::{DecoratedConnection, Layer};
pub use driver::{Driver, NativeConnection};
pub use executor::SqlxConnection;
pub use pool::{DbPool, SqlxDriver};
pub use profiler::{Profiler, ProfilerSnapshot};
pub use retry::RetryPolicy;
