//! docquery - search-argument compiler, plan model and streaming execution
//! runtime for a document database
//!
//! A predicate flows through the crate leaves first:
//!
//! - `expr`: expression tree, parser, printer and evaluator
//! - `planner`: spans a predicate derives for an index key, index choice
//! - `plan`: serializable operator descriptors
//! - `datastore`: keyspace and index capabilities, in-memory implementation
//! - `execution`: runtime that streams a plan's results
//! - `observability`: structured logs and counters
//! - `cli`: command-line front end

pub mod cli;
pub mod datastore;
pub mod execution;
pub mod expr;
pub mod observability;
pub mod plan;
pub mod planner;
