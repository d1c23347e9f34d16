//! Connection decoration chain.
//!
//! A [`DecoratedConnection`] wraps one native connection with, from the outside
//! in: an optional profiler, an optional retry policy, and the native
//! connection itself. Every statement is rendered to the provider's native
//! placeholder style here, then bounded by the statement timeout.

use crate::db::driver::NativeConnection;
use crate::db::profiler::Profiler;
use crate::db::retry::RetryPolicy;
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::models::{Row, Value};
use crate::sql::Statement;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug_span, warn};

/// One layer of the chain, reported outer to inner by [`DecoratedConnection::layers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Layer {
    Profiler,
    Retry,
    Native,
}

#[derive(Debug, Clone, Copy)]
enum CommandKind {
    Execute,
    Fetch,
}

enum Outcome {
    Affected(u64),
    Rows(Vec<Row>),
}

pub struct DecoratedConnection {
    profiler: Option<Arc<Profiler>>,
    retry: Option<RetryPolicy>,
    native: Box<dyn NativeConnection>,
    dialect: Arc<Dialect>,
    timeout: Duration,
    in_transaction: bool,
}

impl std::fmt::Debug for DecoratedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratedConnection")
            .field("provider", &self.dialect.provider)
            .field("layers", &self.layers())
            .field("timeout", &self.timeout)
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl DecoratedConnection {
    pub fn new(native: Box<dyn NativeConnection>, dialect: Arc<Dialect>, timeout: Duration) -> Self {
        Self {
            profiler: None,
            retry: None,
            native,
            dialect,
            timeout,
            in_transaction: false,
        }
    }

    pub fn with_profiler(mut self, profiler: Option<Arc<Profiler>>) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_retry(mut self, retry: Option<RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    pub fn profiler(&self) -> Option<&Arc<Profiler>> {
        self.profiler.as_ref()
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub fn native(&self) -> &dyn NativeConnection {
        self.native.as_ref()
    }

    pub fn native_mut(&mut self) -> &mut dyn NativeConnection {
        self.native.as_mut()
    }

    /// Unwrap the chain down to the concrete native connection type.
    pub fn unwrap_native<T: 'static>(&mut self) -> DbResult<&mut T> {
        let provider = &self.dialect.provider;
        self.native
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| {
                DbError::configuration(
                    format!(
                        "Native connection is not a {}",
                        std::any::type_name::<T>()
                    ),
                    Some(provider),
                )
            })
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Layers present in the chain, outermost first.
    pub fn layers(&self) -> Vec<Layer> {
        let mut layers = Vec::with_capacity(3);
        if self.profiler.is_some() {
            layers.push(Layer::Profiler);
        }
        if self.retry.is_some() {
            layers.push(Layer::Retry);
        }
        layers.push(Layer::Native);
        layers
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub(crate) fn set_in_transaction(&mut self, active: bool) {
        self.in_transaction = active;
    }

    pub(crate) fn into_native(self) -> Box<dyn NativeConnection> {
        self.native
    }

    /// Run a statement and return the affected row count.
    pub async fn execute(&mut self, stmt: &Statement) -> DbResult<u64> {
        match self.dispatch(CommandKind::Execute, stmt).await? {
            Outcome::Affected(n) => Ok(n),
            Outcome::Rows(rows) => Ok(rows.len() as u64),
        }
    }

    /// Run a query and return every row.
    pub async fn fetch(&mut self, stmt: &Statement) -> DbResult<Vec<Row>> {
        match self.dispatch(CommandKind::Fetch, stmt).await? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) => Ok(Vec::new()),
        }
    }

    async fn dispatch(&mut self, kind: CommandKind, stmt: &Statement) -> DbResult<Outcome> {
        let (sql, args) = self.dialect.render(&stmt.sql, &stmt.args)?;

        let Some(profiler) = self.profiler.clone() else {
            return self.retry_loop(kind, stmt.retryable, &sql, &args).await;
        };

        let span = debug_span!(
            "db.command",
            provider = %self.dialect.provider,
            sql = %sql,
            args = args.len(),
        );
        let start = Instant::now();
        let result = self
            .retry_loop(kind, stmt.retryable, &sql, &args)
            .instrument(span)
            .await;
        profiler.record(start.elapsed(), result.is_ok());
        result
    }

    async fn retry_loop(
        &mut self,
        kind: CommandKind,
        retryable: bool,
        sql: &str,
        args: &[Value],
    ) -> DbResult<Outcome> {
        let policy = match &self.retry {
            Some(policy) if retryable && !self.in_transaction => Some(policy.clone()),
            _ => None,
        };

        let mut attempt = 1;
        loop {
            match self.attempt(kind, sql, args).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => match &policy {
                    Some(policy) if policy.should_retry(&e, attempt) => {
                        let delay = policy.delay_for(attempt);
                        warn!(
                            provider = %self.dialect.provider,
                            attempt = attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Transient failure, retrying statement"
                        );
                        if let Some(profiler) = &self.profiler {
                            profiler.record_retry();
                        }
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    _ => return Err(e.with_sql(sql)),
                },
            }
        }
    }

    async fn attempt(&mut self, kind: CommandKind, sql: &str, args: &[Value]) -> DbResult<Outcome> {
        let timeout = self.timeout;
        let native = self.native.as_mut();
        let run = async move {
            match kind {
                CommandKind::Execute => native.execute(sql, args).await.map(Outcome::Affected),
                CommandKind::Fetch => native.fetch(sql, args).await.map(Outcome::Rows),
            }
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(DbError::timeout(
                "statement execution",
                timeout.as_secs() as u32,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use std::any::Any;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedConnection {
        failures: VecDeque<DbError>,
        seen: Vec<(String, Vec<Value>)>,
    }

    impl NativeConnection for ScriptedConnection {
        fn execute<'a>(
            &'a mut self,
            sql: &'a str,
            args: &'a [Value],
        ) -> BoxFuture<'a, DbResult<u64>> {
            Box::pin(async move {
                self.seen.push((sql.to_string(), args.to_vec()));
                match self.failures.pop_front() {
                    Some(e) => Err(e),
                    None => Ok(1),
                }
            })
        }

        fn fetch<'a>(
            &'a mut self,
            sql: &'a str,
            args: &'a [Value],
        ) -> BoxFuture<'a, DbResult<Vec<Row>>> {
            Box::pin(async move {
                self.seen.push((sql.to_string(), args.to_vec()));
                Ok(vec![Row::new(vec!["n".into()], vec![Value::Int(7)])])
            })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }

        fn discard(self: Box<Self>) -> BoxFuture<'static, ()> {
            Box::pin(async {})
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
            backoff: 1.0,
            max_delay: Duration::from_millis(1),
        }
    }

    fn decorated(failures: Vec<DbError>) -> DecoratedConnection {
        let native = ScriptedConnection {
            failures: failures.into(),
            seen: Vec::new(),
        };
        DecoratedConnection::new(
            Box::new(native),
            Arc::new(Dialect::postgres()),
            Duration::from_secs(5),
        )
    }

    fn seen(conn: &mut DecoratedConnection) -> Vec<(String, Vec<Value>)> {
        conn.unwrap_native::<ScriptedConnection>()
            .unwrap()
            .seen
            .clone()
    }

    #[test]
    fn test_layers_order() {
        let conn = decorated(vec![]);
        assert_eq!(conn.layers(), vec![Layer::Native]);

        let conn = decorated(vec![])
            .with_retry(Some(RetryPolicy::default()))
            .with_profiler(Some(Arc::new(Profiler::new())));
        assert_eq!(
            conn.layers(),
            vec![Layer::Profiler, Layer::Retry, Layer::Native]
        );
        assert!(conn.profiler().is_some());
        assert_eq!(conn.retry_policy(), Some(&RetryPolicy::default()));
    }

    #[tokio::test]
    async fn test_renders_native_placeholders() {
        let mut conn = decorated(vec![]);
        let stmt = Statement::new("UPDATE t SET a = @0 WHERE b = @1", vec![1.into(), 2.into()]);
        conn.execute(&stmt).await.unwrap();
        let seen = seen(&mut conn);
        assert_eq!(seen[0].0, "UPDATE t SET a = $1 WHERE b = $2");
        assert_eq!(seen[0].1, vec![Value::Int(1), Value::Int(2)]);
    }

    #[tokio::test]
    async fn test_retries_transient_failure() {
        let profiler = Arc::new(Profiler::new());
        let mut conn = decorated(vec![DbError::timeout("query", 1)])
            .with_retry(Some(fast_retry(3)))
            .with_profiler(Some(Arc::clone(&profiler)));

        let stmt = Statement::new("DELETE FROM t", vec![]).retryable();
        let affected = conn.execute(&stmt).await.unwrap();
        assert_eq!(affected, 1);
        assert_eq!(seen(&mut conn).len(), 2);

        let snap = profiler.snapshot();
        assert_eq!(snap.commands, 1);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.failures, 0);
    }

    #[tokio::test]
    async fn test_unmarked_statement_runs_once() {
        let mut conn = decorated(vec![DbError::timeout("query", 1)]).with_retry(Some(fast_retry(3)));
        let stmt = Statement::new("DELETE FROM t", vec![]);
        assert!(conn.execute(&stmt).await.is_err());
        assert_eq!(seen(&mut conn).len(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_inside_transaction() {
        let mut conn = decorated(vec![DbError::timeout("query", 1)]).with_retry(Some(fast_retry(3)));
        conn.set_in_transaction(true);
        let stmt = Statement::new("DELETE FROM t", vec![]).retryable();
        assert!(conn.execute(&stmt).await.is_err());
        assert_eq!(seen(&mut conn).len(), 1);
    }

    #[tokio::test]
    async fn test_failure_carries_sql() {
        let mut conn = decorated(vec![DbError::database("boom", None, "")]);
        let err = conn
            .execute(&Statement::new("DELETE FROM t WHERE a = @0", vec![1.into()]))
            .await
            .unwrap_err();
        assert_eq!(err.sql(), Some("DELETE FROM t WHERE a = $1"));
    }

    #[tokio::test]
    async fn test_fetch_rows() {
        let mut conn = decorated(vec![]);
        let rows = conn.fetch(&Statement::new("SELECT 7 AS n", vec![])).await.unwrap();
        assert_eq!(rows[0].get("n"), &Value::Int(7));
    }

    #[test]
    fn test_unwrap_native_mismatch() {
        let mut conn = decorated(vec![]);
        let err = conn.unwrap_native::<String>().unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.provider(), Some("PostgreSQL"));
    }
}
