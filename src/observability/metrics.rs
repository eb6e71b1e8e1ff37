//! Query counters
//!
//! - Counters only, monotonic
//! - Atomic increments with Relaxed ordering
//! - One registry per context; snapshots are exact at the time of reading

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by every operator of a query
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    operators_run: AtomicU64,
    items_produced: AtomicU64,
    errors_reported: AtomicU64,
    queries_executed: AtomicU64,
    queries_failed: AtomicU64,
    sarg_fallbacks: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// An operator body started running
    pub fn increment_operators_run(&self) {
        self.operators_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_items_produced(&self, n: u64) {
        self.items_produced.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_errors_reported(&self) {
        self.errors_reported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A predicate could not bound any index; the plan scans everything
    pub fn increment_sarg_fallbacks(&self) {
        self.sarg_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operators_run: self.operators_run.load(Ordering::Relaxed),
            items_produced: self.items_produced.load(Ordering::Relaxed),
            errors_reported: self.errors_reported.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            sarg_fallbacks: self.sarg_fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub operators_run: u64,
    pub items_produced: u64,
    pub errors_reported: u64,
    pub queries_executed: u64,
    pub queries_failed: u64,
    pub sarg_fallbacks: u64,
}
