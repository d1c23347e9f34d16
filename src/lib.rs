//! sqlbridge library
//!
//! Dialect-neutral SQL generation, a pluggable provider registry and a bulk
//! insert engine over sqlx (SQLite, PostgreSQL, MySQL), with room for
//! externally supplied drivers such as SQL Server.
//!
//! A [`DatabaseFactory`] is configured once per process. Every unit of work
//! takes its own [`Database`] handle from it.

pub mod bulk;
pub mod config;
pub mod database;
pub mod db;
pub mod dialect;
pub mod error;
pub mod factory;
pub mod metadata;
pub mod models;
pub mod sql;

pub use bulk::{BulkInsertOptions, BulkInsertPlan, BulkInsertStrategy};
pub use config::{Config, DatabaseConfig};
pub use database::{Database, UpsertOutcome};
pub use db::{Driver, NativeConnection, RetryPolicy};
pub use dialect::{Dialect, IsolationLevel, ProviderRegistry};
pub use error::{DbError, DbResult};
pub use factory::{DatabaseFactory, FactoryReport};
pub use metadata::{Field, MetadataCache, Record, TableDescriptor};
pub use models::{FromValue, Row, ToValue, Value};
pub use sql::{Predicate, Sql, SqlContext, Statement};
