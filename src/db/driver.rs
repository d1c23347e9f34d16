//! Native driver seam.
//!
//! Everything below the decoration chain goes through these two traits. The
//! bundled implementation is backed by sqlx (see [`SqlxDriver`](super::SqlxDriver));
//! engines without a bundled driver, and test doubles, plug in by implementing
//! them and handing the driver to
//! [`DatabaseFactory::configure_with_driver`](crate::factory::DatabaseFactory::configure_with_driver).
//!
//! SQL reaching a [`NativeConnection`] is already rendered in the provider's
//! native placeholder style, with arguments in binding order.

use crate::error::DbResult;
use crate::models::{Row, Value};
use futures_util::future::BoxFuture;
use std::any::Any;

/// Opens native connections for one configured connection string.
pub trait Driver: Send + Sync {
    /// Check connectivity; returns the server version string.
    fn probe(&self) -> BoxFuture<'_, DbResult<String>>;

    /// Open (or check out) a connection for one unit of work.
    fn connect(&self) -> BoxFuture<'_, DbResult<Box<dyn NativeConnection>>>;

    /// Release every pooled resource.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// One open native connection.
pub trait NativeConnection: Send {
    /// Run a statement and return the affected row count.
    fn execute<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> BoxFuture<'a, DbResult<u64>>;

    /// Run a query and return every row.
    fn fetch<'a>(&'a mut self, sql: &'a str, args: &'a [Value])
    -> BoxFuture<'a, DbResult<Vec<Row>>>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Close the connection without handing it back to a pool. Used when a
    /// unit of work ends with an open transaction.
    fn discard(self: Box<Self>) -> BoxFuture<'static, ()>;
}
