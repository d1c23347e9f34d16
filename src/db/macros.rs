//! Database dispatch macros for reducing code duplication.
//!
//! These macros generate the per-backend match arms over the sqlx pool and
//! connection enums while keeping each call site readable top to bottom.

/// Macro for generating `DbPool` dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

/// Macro for generating `SqlxConnection` dispatch match arms.
#[macro_export]
macro_rules! impl_conn_dispatch {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::executor::SqlxConnection::$variant($c) => $body,
            )+
        }
    };
}

pub use impl_conn_dispatch;
pub use impl_db_dispatch;

#[cfg(test)]
mod tests {
    use crate::db::executor::SqlxConnection;
    use crate::db::pool::DbPool;
    use crate::models::DatabaseType;
    use sqlx::sqlite::SqlitePoolOptions;

    fn pool_name(pool: &DbPool) -> &'static str {
        impl_db_dispatch!(pool, {
            MySql(_p) => "mysql",
            Postgres(_p) => "postgres",
            SQLite(_p) => "sqlite",
        })
    }

    #[tokio::test]
    async fn test_dispatch_selects_matching_arm() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let pool = DbPool::SQLite(pool);
        assert_eq!(pool_name(&pool), "sqlite");
        assert_eq!(pool.db_type(), DatabaseType::SQLite);

        let conn = pool.acquire().await.unwrap();
        let name = impl_conn_dispatch!(&conn, {
            MySql(_c) => "mysql",
            Postgres(_c) => "postgres",
            SQLite(_c) => "sqlite",
        });
        assert_eq!(name, "sqlite");
        assert!(matches!(conn, SqlxConnection::SQLite(_)));
    }
}
