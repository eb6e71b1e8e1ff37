//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Query counters
//! - Begin/complete scopes around query execution
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No background threads
//! 4. Deterministic output
//!
//! ```ignore
//! use docquery::observability::{Logger, MetricsRegistry, ObservationScope};
//!
//! Logger::info("INDEX_CREATED", &[("index", "ix_age")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_queries_executed();
//!
//! let scope = ObservationScope::new("QUERY");
//! scope.complete();
//! ```

mod logger;
mod metrics;
mod scope;

pub use logger::{format_line, Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;
