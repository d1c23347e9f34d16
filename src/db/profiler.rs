//! Command profiler.
//!
//! Counts commands flowing through the decoration chain. Counters are plain
//! atomics so one profiler can be shared by every handle a factory creates.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Profiler {
    commands: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    total_micros: AtomicU64,
}

/// Point-in-time copy of the profiler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfilerSnapshot {
    pub commands: u64,
    pub failures: u64,
    pub retries: u64,
    pub total_micros: u64,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished command.
    pub fn record(&self, elapsed: Duration, ok: bool) {
        self.commands.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProfilerSnapshot {
        ProfilerSnapshot {
            commands: self.commands.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            total_micros: self.total_micros.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.commands.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.total_micros.store(0, Ordering::Relaxed);
    }
}
