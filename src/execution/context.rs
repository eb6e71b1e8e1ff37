//! Per-query execution context
//!
//! Shared by every operator of one query. Read-mostly: the readonly flag,
//! bindings and stop signal never change once the query runs. The error
//! slot is the only mutation point and keeps the first error reported.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use uuid::Uuid;

use super::errors::ExecutionError;
use crate::expr::Bindings;
use crate::observability::MetricsRegistry;

/// Default bound of every operator output channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    /// Mutating operators complete without side effects
    pub readonly: bool,
    /// Items buffered between a producer and its consumer
    pub channel_capacity: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            readonly: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

pub struct Context {
    query_id: Uuid,
    options: ContextOptions,
    bindings: Bindings,
    error: Mutex<Option<ExecutionError>>,
    stop: watch::Sender<bool>,
    metrics: Arc<MetricsRegistry>,
}

impl Context {
    pub fn new(options: ContextOptions) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            query_id: Uuid::new_v4(),
            options,
            bindings: Bindings::new(),
            error: Mutex::new(None),
            stop,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Parameter values for `$name` and `$1` references
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Reports into a shared registry instead of a private one
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn readonly(&self) -> bool {
        self.options.readonly
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Records an error and stops the query. Only the first error is kept.
    pub fn error(&self, err: ExecutionError) {
        self.metrics.increment_errors_reported();
        {
            let mut slot = match self.error.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.stop();
    }

    /// The first error reported, if any
    pub fn first_error(&self) -> Option<ExecutionError> {
        match self.error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Signals every operator to stop producing
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves once `stop` has been called
    pub async fn stopped(&self) {
        let mut rx = self.stop.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}
