//! Plan node set
//!
//! Immutable operator descriptors forming a DAG, a visitor for whole-plan
//! walks, and the canonical JSON form used to ship plans between processes.

mod codec;
mod errors;
mod operators;
mod visitor;

pub use codec::{decode, encode, OPERATOR_KEY};
pub use errors::{PlanError, PlanResult};
pub use operators::{
    Alias, CreateIndex, Fetch, Filter, IndexDefinition, IndexScan, IntersectAll, Operator,
    OperatorKind, PrimaryScan, UnionAll,
};
pub use visitor::PlanVisitor;
