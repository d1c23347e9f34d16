//! Bulk insert engine.
//!
//! Two strategies ship with the crate:
//! - [`CommandBulkInsert`]: multi-row `INSERT ... VALUES` statements, split so
//!   no statement binds more parameters than the dialect allows.
//! - [`PostgresCopyBulkInsert`]: streams rows through `COPY ... FROM STDIN`.
//!
//! Strategies receive rows already reduced to the table's writable columns,
//! in declaration order.

mod command;
mod copy;

pub use command::{CommandBulkInsert, insert_statement};
pub use copy::{PostgresCopyBulkInsert, copy_statement, encode_csv_row};

use crate::db::DecoratedConnection;
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::metadata::{Record, TableDescriptor};
use crate::models::Value;
use futures_util::future::BoxFuture;
use std::ops::Range;

/// A way of inserting many rows into one table.
pub trait BulkInsertStrategy: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Insert `rows` (writable-column values) and return the inserted count.
    fn insert<'a>(
        &'a self,
        conn: &'a mut DecoratedConnection,
        table: &'a TableDescriptor,
        rows: &'a [Vec<Value>],
    ) -> BoxFuture<'a, DbResult<u64>>;
}

/// Caller opt-ins for a bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkInsertOptions {
    /// Use the provider's native bulk-copy path when the dialect supports it.
    pub native: bool,
}

impl BulkInsertOptions {
    pub fn native() -> Self {
        Self { native: true }
    }
}

/// How a bulk insert is split into statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkInsertPlan {
    pub total: usize,
    pub records_per_statement: usize,
    pub statement_count: usize,
}

impl BulkInsertPlan {
    /// Plan `total` records of `columns` bound values under a parameter limit.
    pub fn new(total: usize, columns: usize, max_params: usize) -> DbResult<Self> {
        let capacity = (columns > 0).then(|| max_params / columns);
        Self::with_capacity(total, columns, capacity)
    }

    pub fn for_dialect(dialect: &Dialect, total: usize, columns: usize) -> DbResult<Self> {
        Self::with_capacity(total, columns, dialect.max_rows_per_insert(columns))
    }

    fn with_capacity(total: usize, columns: usize, capacity: Option<usize>) -> DbResult<Self> {
        // no bound columns: everything fits in one statement
        let records_per_statement = capacity.unwrap_or(total.max(1));
        if records_per_statement == 0 {
            return Err(DbError::builder(format!(
                "A single record binds {} parameters, more than the statement limit",
                columns
            )));
        }
        Ok(Self {
            total,
            records_per_statement,
            statement_count: total.div_ceil(records_per_statement),
        })
    }

    /// Record index ranges, one per statement, in input order.
    pub fn groups(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.statement_count).map(move |i| {
            let start = i * self.records_per_statement;
            start..(start + self.records_per_statement).min(self.total)
        })
    }
}

/// Writable-column values of one record, in declaration order.
pub fn writable_values<R: Record>(table: &TableDescriptor, record: &R) -> DbResult<Vec<Value>> {
    let mut values = record.values();
    if values.len() != table.columns.len() {
        return Err(DbError::schema(
            format!(
                "Record yields {} values for {} columns",
                values.len(),
                table.columns.len()
            ),
            table.table_name.clone(),
        ));
    }
    let writable = table.writable_indices();
    if writable.len() == values.len() {
        return Ok(values);
    }
    let mut out = Vec::with_capacity(writable.len());
    for idx in writable.into_iter().rev() {
        out.push(values.swap_remove(idx));
    }
    out.reverse();
    Ok(out)
}
