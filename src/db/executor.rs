//! Statement execution over pooled sqlx connections.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific query and write operations
//! - `postgres`: PostgreSQL-specific query and write operations
//! - `sqlite`: SQLite-specific query and write operations
//!
//! Each submodule provides identical functionality adapted to the database's type system.
//! Timeouts are applied by the decoration chain, not here.

use crate::db::driver::NativeConnection;
use crate::db::types::ToRow;
use crate::error::{DbError, DbResult};
use crate::models::{Row, Value};
use futures_util::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, MySql, Postgres, Sqlite};
use std::any::Any;
use tracing::debug;

/// A connection checked out of one of the bundled sqlx pools.
pub enum SqlxConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

impl SqlxConnection {
    /// Borrow the underlying PostgreSQL connection, if this is one.
    pub fn as_postgres_mut(&mut self) -> Option<&mut PgConnection> {
        match self {
            SqlxConnection::Postgres(conn) => Some(&mut **conn),
            _ => None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        impl_conn_dispatch!(self, {
            MySql(_c) => "MySQL",
            Postgres(_c) => "PostgreSQL",
            SQLite(_c) => "SQLite",
        })
    }
}

impl NativeConnection for SqlxConnection {
    fn execute<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> BoxFuture<'a, DbResult<u64>> {
        Box::pin(async move {
            debug!(sql = %sql, params = args.len(), "Executing statement");
            impl_conn_dispatch!(self, {
                MySql(c) => mysql::execute(c, sql, args).await,
                Postgres(c) => postgres::execute(c, sql, args).await,
                SQLite(c) => sqlite::execute(c, sql, args).await,
            })
        })
    }

    fn fetch<'a>(
        &'a mut self,
        sql: &'a str,
        args: &'a [Value],
    ) -> BoxFuture<'a, DbResult<Vec<Row>>> {
        Box::pin(async move {
            debug!(sql = %sql, params = args.len(), "Executing query");
            impl_conn_dispatch!(self, {
                MySql(c) => mysql::fetch_rows(c, sql, args).await,
                Postgres(c) => postgres::fetch_rows(c, sql, args).await,
                SQLite(c) => sqlite::fetch_rows(c, sql, args).await,
            })
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn discard(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let result = match *self {
                SqlxConnection::MySql(c) => c.detach().close().await,
                SqlxConnection::Postgres(c) => c.detach().close().await,
                SqlxConnection::SQLite(c) => c.detach().close().await,
            };
            if let Err(e) = result {
                debug!(error = %e, "Error closing discarded connection");
            }
        })
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn collect_rows<R: ToRow>(results: Result<Vec<R>, sqlx::Error>) -> DbResult<Vec<Row>> {
    let rows = results.map_err(DbError::from)?;
    Ok(rows.iter().map(ToRow::to_row).collect())
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::Executor;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        conn: &mut PoolConnection<MySql>,
        sql: &str,
        params: &[Value],
    ) -> DbResult<Vec<Row>> {
        // When params is empty, use raw SQL to avoid prepared statement issues
        let results: Result<Vec<MySqlRow>, _> = if params.is_empty() {
            (&mut **conn).fetch_all(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            query.fetch_all(&mut **conn).await
        };
        collect_rows(results)
    }

    pub async fn execute(
        conn: &mut PoolConnection<MySql>,
        sql: &str,
        params: &[Value],
    ) -> DbResult<u64> {
        // Some statements (CREATE PROCEDURE, transaction control) don't support prepared statements
        let result = if params.is_empty() {
            (&mut **conn).execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            query.execute(&mut **conn).await
        };
        Ok(result?.rows_affected())
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::Executor;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        conn: &mut PoolConnection<Postgres>,
        sql: &str,
        params: &[Value],
    ) -> DbResult<Vec<Row>> {
        let results: Result<Vec<PgRow>, _> = if params.is_empty() {
            (&mut **conn).fetch_all(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            query.fetch_all(&mut **conn).await
        };
        collect_rows(results)
    }

    pub async fn execute(
        conn: &mut PoolConnection<Postgres>,
        sql: &str,
        params: &[Value],
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            (&mut **conn).execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            query.execute(&mut **conn).await
        };
        Ok(result?.rows_affected())
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::Executor;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        conn: &mut PoolConnection<Sqlite>,
        sql: &str,
        params: &[Value],
    ) -> DbResult<Vec<Row>> {
        let results: Result<Vec<SqliteRow>, _> = if params.is_empty() {
            (&mut **conn).fetch_all(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query.fetch_all(&mut **conn).await
        };
        collect_rows(results)
    }

    pub async fn execute(
        conn: &mut PoolConnection<Sqlite>,
        sql: &str,
        params: &[Value],
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            (&mut **conn).execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query.execute(&mut **conn).await
        };
        Ok(result?.rows_affected())
    }
}
