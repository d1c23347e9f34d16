//! Unit-of-work database handle.
//!
//! A [`Database`] is obtained from
//! [`DatabaseFactory::create_database`](crate::factory::DatabaseFactory::create_database).
//! It shares the factory's dialect and metadata cache but owns its connection
//! and transaction scope. The connection is opened on first use. A handle is
//! not meant to be shared between tasks; each unit of work takes its own.

use crate::bulk::{BulkInsertOptions, BulkInsertStrategy, insert_statement, writable_values};
use crate::db::DecoratedConnection;
use crate::dialect::IsolationLevel;
use crate::error::{DbError, DbResult};
use crate::factory::SharedState;
use crate::metadata::{Field, Record};
use crate::models::{FromValue, Row, Value};
use crate::sql::{IntoStatement, Sql, SqlContext, Statement};
use std::sync::Arc;
use tracing::{debug, warn};

/// How many times `insert_or_update` re-runs after losing an insert race.
const UPSERT_ATTEMPTS: u32 = 3;

/// Result of [`Database::insert_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

pub struct Database {
    shared: Arc<SharedState>,
    conn: Option<DecoratedConnection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("provider", &self.shared.provider)
            .field("connected", &self.conn.is_some())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

impl Database {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        Self { shared, conn: None }
    }

    pub fn provider(&self) -> &str {
        &self.shared.provider
    }

    pub fn context(&self) -> &SqlContext {
        &self.shared.ctx
    }

    /// Start a statement bound to this handle's dialect and metadata cache.
    pub fn sql(&self) -> Sql {
        self.shared.ctx.sql()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(DecoratedConnection::in_transaction)
    }

    /// The decorated connection, opened on first use.
    pub async fn connection(&mut self) -> DbResult<&mut DecoratedConnection> {
        if self.conn.is_none() {
            let conn = self.open().await?;
            self.conn = Some(conn);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::internal("Connection was not opened"))
    }

    async fn open(&self) -> DbResult<DecoratedConnection> {
        let shared = &self.shared;
        let driver = shared.driver.as_ref();
        let timeout = shared.connect_timeout;
        let connect = || async move {
            match tokio::time::timeout(timeout, driver.connect()).await {
                Ok(result) => result,
                Err(_) => Err(DbError::timeout("connection open", timeout.as_secs() as u32)),
            }
        };

        let native = match &shared.retry {
            Some(policy) => policy.run("connection open", connect).await?,
            None => connect().await?,
        };
        debug!(provider = %shared.provider, "Opened connection");

        Ok(
            DecoratedConnection::new(native, shared.ctx.dialect_arc(), shared.statement_timeout)
                .with_retry(shared.retry.clone())
                .with_profiler(shared.profiler.clone()),
        )
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Execute a statement and return the affected row count.
    pub async fn execute(&mut self, sql: impl IntoStatement) -> DbResult<u64> {
        let stmt = sql.into_statement()?;
        self.connection().await?.execute(&stmt).await
    }

    /// Execute a query and return the raw rows.
    pub async fn fetch_rows(&mut self, sql: impl IntoStatement) -> DbResult<Vec<Row>> {
        let stmt = sql.into_statement()?;
        self.connection().await?.fetch(&stmt).await
    }

    /// Execute a query and map every row to `R`.
    pub async fn fetch<R: Record>(&mut self, sql: impl IntoStatement) -> DbResult<Vec<R>> {
        self.fetch_rows(sql).await?.iter().map(R::from_row).collect()
    }

    /// First row mapped to `R`, if any.
    pub async fn first<R: Record>(&mut self, sql: impl IntoStatement) -> DbResult<Option<R>> {
        let rows = self.fetch_rows(sql).await?;
        rows.first().map(R::from_row).transpose()
    }

    /// First column of the first row. No rows reads as NULL.
    pub async fn execute_scalar<T: FromValue>(&mut self, sql: impl IntoStatement) -> DbResult<T> {
        let rows = self.fetch_rows(sql).await?;
        let value = rows
            .first()
            .and_then(|row| row.get_index(0))
            .unwrap_or(&Value::Null);
        T::from_value(value)
    }

    // -------------------------------------------------------------------------
    // Bulk insert
    // -------------------------------------------------------------------------

    /// Insert many records through the generic command strategy.
    pub async fn insert_bulk<R: Record>(&mut self, records: &[R]) -> DbResult<u64> {
        self.insert_bulk_with(records, BulkInsertOptions::default())
            .await
    }

    /// Insert many records, optionally through the provider's native bulk path.
    pub async fn insert_bulk_with<R: Record>(
        &mut self,
        records: &[R],
        options: BulkInsertOptions,
    ) -> DbResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let table = self.shared.ctx.table::<R>();
        table.require_named()?;
        let rows = records
            .iter()
            .map(|record| writable_values(&table, record))
            .collect::<DbResult<Vec<_>>>()?;

        let strategy = self.bulk_strategy(options);
        debug!(
            table = %table.table_name,
            rows = rows.len(),
            strategy = strategy.name(),
            "Bulk insert"
        );
        let conn = self.connection().await?;
        strategy.insert(conn, &table, &rows).await
    }

    fn bulk_strategy(&self, options: BulkInsertOptions) -> Arc<dyn BulkInsertStrategy> {
        let native = options.native && self.shared.ctx.dialect().supports_bulk_copy;
        match (&self.shared.specialized, native) {
            (Some(strategy), true) => Arc::clone(strategy),
            (None, true) => {
                debug!(
                    provider = %self.shared.provider,
                    "No native bulk strategy registered, using fallback"
                );
                Arc::clone(&self.shared.fallback)
            }
            _ => Arc::clone(&self.shared.fallback),
        }
    }

    // -------------------------------------------------------------------------
    // Insert or update
    // -------------------------------------------------------------------------

    /// Update the row matching `key_fields` (the primary key when empty), or
    /// insert it when no row matches.
    ///
    /// A constraint violation on insert means a concurrent writer got there
    /// first; the update is retried a bounded number of times.
    pub async fn insert_or_update<R: Record>(
        &mut self,
        record: &R,
        key_fields: &[Field<R>],
    ) -> DbResult<UpsertOutcome> {
        let table = self.shared.ctx.table::<R>();
        let table_name = table.require_named()?.to_string();
        let definition = R::definition();
        let values = record.values();
        if values.len() != definition.columns.len() {
            return Err(DbError::schema(
                format!(
                    "Record yields {} values for {} columns",
                    values.len(),
                    definition.columns.len()
                ),
                table_name,
            ));
        }

        let keys: Vec<&'static str> = if key_fields.is_empty() {
            let pk = definition
                .columns
                .iter()
                .find(|c| c.primary_key)
                .ok_or_else(|| {
                    DbError::builder(format!(
                        "insert_or_update on {} needs key fields or a primary key",
                        table_name
                    ))
                })?;
            vec![pk.member]
        } else {
            key_fields.iter().map(Field::member).collect()
        };

        let mut key_predicates = Vec::with_capacity(keys.len());
        let mut sets = Vec::new();
        for (idx, spec) in definition.columns.iter().enumerate() {
            let field = Field::<R>::new(spec.member);
            if keys.contains(&spec.member) {
                key_predicates.push(field.eq(values[idx].clone()));
            } else if table.is_writable(&table.columns[idx]) {
                sets.push((field, values[idx].clone()));
            }
        }
        if key_predicates.len() != keys.len() {
            return Err(DbError::builder(format!(
                "Key field is not a member of {}",
                table_name
            )));
        }

        let counts_only = sets.is_empty();
        let matched = if counts_only {
            let mut probe = self.sql().select_count().from::<R>();
            for predicate in &key_predicates {
                probe = probe.where_(predicate.clone());
            }
            probe.build()?
        } else {
            let mut update = self.sql().update::<R>(|mut set| {
                for (field, value) in sets {
                    set = set.set(field, value);
                }
                set
            });
            for predicate in &key_predicates {
                update = update.where_(predicate.clone());
            }
            update.build()?
        };
        let insert = insert_statement(
            self.shared.ctx.dialect(),
            &table,
            &[writable_values(&table, record)?],
        )?;

        let mut last_error = None;
        for attempt in 1..=UPSERT_ATTEMPTS {
            if self.matched_rows(&matched, counts_only).await? > 0 {
                return Ok(UpsertOutcome::Updated);
            }
            match self.execute(insert.clone()).await {
                Ok(_) => return Ok(UpsertOutcome::Inserted),
                Err(e @ DbError::ConstraintViolation { .. }) => {
                    debug!(
                        table = %table_name,
                        attempt = attempt,
                        error = %e,
                        "Insert lost a race, retrying update"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let sql_state = last_error
            .as_ref()
            .and_then(|e| e.sql_state())
            .map(String::from);
        Err(DbError::constraint_violation(
            format!(
                "insert_or_update on {} did not settle after {} attempts",
                table_name, UPSERT_ATTEMPTS
            ),
            sql_state,
        )
        .with_sql(insert.sql))
    }

    async fn matched_rows(&mut self, stmt: &Statement, counts_only: bool) -> DbResult<u64> {
        if counts_only {
            let count: i64 = self.execute_scalar(stmt.clone()).await?;
            Ok(count.max(0) as u64)
        } else {
            self.execute(stmt.clone()).await
        }
    }

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------

    /// Begin a transaction at the dialect's default isolation level.
    pub async fn begin(&mut self) -> DbResult<()> {
        let level = self.shared.ctx.dialect().isolation;
        self.begin_with(level).await
    }

    pub async fn begin_with(&mut self, level: IsolationLevel) -> DbResult<()> {
        if self.in_transaction() {
            return Err(DbError::transaction("A transaction is already open"));
        }
        let statements = self.shared.ctx.dialect().begin_transaction(level);
        let conn = self.connection().await?;
        for sql in statements {
            conn.execute(&Statement::new(sql, Vec::new()))
                .await?;
        }
        conn.set_in_transaction(true);
        debug!(provider = %self.shared.provider, isolation = %level, "Transaction started");
        Ok(())
    }

    pub async fn commit(&mut self) -> DbResult<()> {
        self.finish_transaction("COMMIT").await
    }

    pub async fn rollback(&mut self) -> DbResult<()> {
        self.finish_transaction("ROLLBACK").await
    }

    async fn finish_transaction(&mut self, verb: &str) -> DbResult<()> {
        let Some(conn) = self.conn.as_mut().filter(|c| c.in_transaction()) else {
            return Err(DbError::transaction(format!(
                "{} without an open transaction",
                verb
            )));
        };
        let result = conn
            .execute(&Statement::new(verb, Vec::new()))
            .await;
        // the transaction is over either way
        conn.set_in_transaction(false);
        result.map(|_| ())
    }

    /// Close the handle, rolling back an open transaction.
    pub async fn close(mut self) -> DbResult<()> {
        let result = if self.in_transaction() {
            warn!(provider = %self.shared.provider, "Closing handle with open transaction, rolling back");
            self.rollback().await
        } else {
            Ok(())
        };
        self.conn = None;
        result
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if !conn.in_transaction() {
            return;
        }

        warn!(
            provider = %self.shared.provider,
            "Database handle dropped with open transaction, discarding connection"
        );
        let native = conn.into_native();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(native.discard());
            }
            Err(_) => drop(native),
        }
    }
}
