//! Query planner subsystem
//!
//! From predicate to plan:
//!
//! - `spans`: index key ranges (`Inclusion`, `Range`, `Span`)
//! - `sarg`: derives spans from a predicate for one index key
//! - `planner`: picks an index and builds the operator tree
//! - `explain`: renders a plan for humans
//!
//! # Design Principles
//!
//! - Sound: spans never exclude a document the predicate accepts
//! - Conservative: anything not understood yields no spans, never an error
//! - Deterministic: indexes are tried in name order, so the same catalog and
//!   predicate always give the same plan
//! - Residual: the full predicate is re-applied after every scan

mod errors;
mod explain;
mod planner;
mod sarg;
mod spans;

pub use errors::{PlannerError, PlannerErrorCode, PlannerResult};
pub use explain::ExplainPlan;
pub use planner::{AccessPlanner, IndexChoice, SelectOptions};
pub use sarg::{sarg_for, sarg_for_keys, KeyShape, MAX_SPANS};
pub use spans::{Inclusion, Range, Span, Spans};
