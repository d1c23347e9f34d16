//! Shared test doubles.

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use sqlbridge::db::{Driver, NativeConnection};
use sqlbridge::error::{DbError, DbResult};
use sqlbridge::models::{Row, Value};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One statement as it reached the native layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub args: Vec<Value>,
}

#[derive(Default)]
struct Script {
    statements: Mutex<Vec<Recorded>>,
    /// `None` lets one statement through before the next queued failure.
    failures: Mutex<VecDeque<Option<DbError>>>,
    rows: Mutex<VecDeque<Vec<Row>>>,
    affected: Mutex<VecDeque<u64>>,
}

impl Script {
    fn run(&self, sql: &str, args: &[Value]) -> DbResult<()> {
        self.statements.lock().unwrap().push(Recorded {
            sql: sql.to_string(),
            args: args.to_vec(),
        });
        match self.failures.lock().unwrap().pop_front() {
            Some(Some(e)) => Err(e),
            _ => Ok(()),
        }
    }
}

/// Driver double: records every statement, replays queued failures and
/// results, and counts probes, connects and discards.
pub struct RecordingDriver {
    script: Arc<Script>,
    probes: AtomicUsize,
    connects: AtomicUsize,
    discards: Arc<AtomicUsize>,
    probe_delay: Duration,
    probe_error: Mutex<Option<DbError>>,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self {
            script: Arc::new(Script::default()),
            probes: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            discards: Arc::new(AtomicUsize::new(0)),
            probe_delay: Duration::ZERO,
            probe_error: Mutex::new(None),
        }
    }
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Driver whose probe takes `delay`, to widen initialization races.
    pub fn with_probe_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            probe_delay: delay,
            ..Self::default()
        })
    }

    /// Driver whose probe fails with `err`.
    pub fn failing_probe(err: DbError) -> Arc<Self> {
        Arc::new(Self {
            probe_error: Mutex::new(Some(err)),
            ..Self::default()
        })
    }

    /// Fail the next statement with `err`.
    pub fn fail_next(&self, err: DbError) {
        self.script.failures.lock().unwrap().push_back(Some(err));
    }

    /// Let the next statement succeed; later queued failures shift back by one.
    pub fn pass_next(&self) {
        self.script.failures.lock().unwrap().push_back(None);
    }

    /// Rows returned by the next fetch.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.script.rows.lock().unwrap().push_back(rows);
    }

    /// Affected count returned by the next execute.
    pub fn push_affected(&self, n: u64) {
        self.script.affected.lock().unwrap().push_back(n);
    }

    pub fn statements(&self) -> Vec<Recorded> {
        self.script.statements.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|r| r.sql).collect()
    }

    pub fn clear(&self) {
        self.script.statements.lock().unwrap().clear();
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }
}

impl Driver for RecordingDriver {
    fn probe(&self) -> BoxFuture<'_, DbResult<String>> {
        Box::pin(async move {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if !self.probe_delay.is_zero() {
                tokio::time::sleep(self.probe_delay).await;
            }
            match self.probe_error.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok("recording 1.0".to_string()),
            }
        })
    }

    fn connect(&self) -> BoxFuture<'_, DbResult<Box<dyn NativeConnection>>> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingConnection {
                script: Arc::clone(&self.script),
                discards: Arc::clone(&self.discards),
            }) as Box<dyn NativeConnection>)
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

pub struct RecordingConnection {
    script: Arc<Script>,
    discards: Arc<AtomicUsize>,
}

impl NativeConnection for RecordingConnection {
    fn execute<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> BoxFuture<'a, DbResult<u64>> {
        Box::pin(async move {
            self.script.run(sql, args)?;
            Ok(self.script.affected.lock().unwrap().pop_front().unwrap_or(1))
        })
    }

    fn fetch<'a>(
        &'a mut self,
        sql: &'a str,
        args: &'a [Value],
    ) -> BoxFuture<'a, DbResult<Vec<Row>>> {
        Box::pin(async move {
            self.script.run(sql, args)?;
            Ok(self.script.rows.lock().unwrap().pop_front().unwrap_or_default())
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn discard(self: Box<Self>) -> BoxFuture<'static, ()> {
        let discards = Arc::clone(&self.discards);
        Box::pin(async move {
            discards.fetch_add(1, Ordering::SeqCst);
        })
    }
}
