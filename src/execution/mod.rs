//! Streaming execution runtime
//!
//! A plan is instantiated into a tree of runtime operators. Each operator
//! runs on its own task and streams items to its consumer through a bounded
//! channel.
//!
//! # Guarantees
//!
//! - An operator body runs at most once, however many callers drive it
//! - An operator's output closes before it reports a terminal state
//! - The first error reported stops every operator of the query
//! - `run` returns every item or the first error, never a partial result
//! - Mutating operators do nothing under a readonly context

mod base;
mod builder;
mod combine;
mod context;
mod ddl;
mod errors;
mod operator;
mod scan;
mod transform;

pub use base::{Base, Input, Output, State};
pub use builder::Builder;
pub use combine::{IntersectAllExec, UnionAllExec};
pub use context::{Context, ContextOptions, DEFAULT_CHANNEL_CAPACITY};
pub use ddl::CreateIndexExec;
pub use errors::{ExecutionError, ExecutionErrorCode, ExecutionResult};
pub use operator::{start, ExecOperator};
pub use scan::{IndexScanExec, PrimaryScanExec};
pub use transform::{AliasExec, FetchExec, FilterExec};

use std::sync::Arc;

use serde_json::Value;

use crate::observability::{Logger, ObservationScope};
use crate::plan::Operator;

/// Executes `plan` to completion and collects the root's items
pub async fn run(plan: &Operator, ctx: Arc<Context>) -> ExecutionResult<Vec<Value>> {
    let query_id = ctx.query_id().to_string();
    let scope = ObservationScope::with_fields(
        "QUERY",
        &[("query_id", query_id.as_str()), ("root", plan.name())],
    );
    ctx.metrics().increment_queries_executed();

    match drain(plan, &ctx).await {
        Ok(items) => {
            let count = items.len().to_string();
            scope.complete_with_fields(&[("items", count.as_str())]);
            Ok(items)
        }
        Err(err) => {
            ctx.metrics().increment_queries_failed();
            scope.fail(err.code().code(), err.message());
            Err(err)
        }
    }
}

async fn drain(plan: &Operator, ctx: &Arc<Context>) -> ExecutionResult<Vec<Value>> {
    let root = Builder::new(ctx.options().channel_capacity).build(plan)?;

    let mut items = Vec::new();
    let mut input = start(&root, ctx, None)?;
    while let Some(item) = input.recv().await {
        items.push(item);
    }
    root.base().wait().await;

    if let Some(err) = ctx.first_error() {
        return Err(err);
    }
    if ctx.is_stopped() {
        let query_id = ctx.query_id().to_string();
        let discarded = items.len().to_string();
        Logger::warn(
            "QUERY_CANCELLED",
            &[("query_id", query_id.as_str()), ("items_discarded", discarded.as_str())],
        );
        return Err(ExecutionError::cancelled());
    }
    Ok(items)
}
