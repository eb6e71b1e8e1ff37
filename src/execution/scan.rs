//! Leaf operators: index range scans and primary scans

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};

use super::base::{Base, Output, State};
use super::context::Context;
use super::errors::ExecutionResult;
use super::operator::{drive, evaluate_limit, ExecOperator};
use crate::datastore::ScanSpan;
use crate::expr::{Bindings, Expression};
use crate::plan::{IndexScan, PrimaryScan};
use crate::planner::Span;

/// Evaluates a list of key expressions. `None` if any component is MISSING.
fn evaluate_keys(exprs: &[Expression], bindings: &Bindings) -> ExecutionResult<Option<Vec<Value>>> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        match expr.evaluate(&Value::Null, bindings)? {
            Some(value) => values.push(value),
            None => return Ok(None),
        }
    }
    Ok(Some(values))
}

/// Concrete scan bounds for a planned span. `None` when a bound is MISSING,
/// in which case the span cannot match anything.
pub(crate) fn scan_span(span: &Span, bindings: &Bindings) -> ExecutionResult<Option<ScanSpan>> {
    let seek = match &span.seek {
        Some(exprs) => match evaluate_keys(exprs, bindings)? {
            Some(values) => Some(values),
            None => return Ok(None),
        },
        None => None,
    };
    let Some(low) = evaluate_keys(&span.range.low, bindings)? else {
        return Ok(None);
    };
    let Some(high) = evaluate_keys(&span.range.high, bindings)? else {
        return Ok(None);
    };
    Ok(Some(ScanSpan {
        seek,
        low,
        high,
        inclusion: span.range.inclusion,
    }))
}

pub struct IndexScanExec {
    plan: Arc<IndexScan>,
    base: Base,
}

impl IndexScanExec {
    pub fn new(plan: Arc<IndexScan>, capacity: usize) -> Self {
        Self {
            plan,
            base: Base::new("IndexScan", capacity),
        }
    }

    async fn execute(self: Arc<Self>, ctx: Arc<Context>, out: Output) -> ExecutionResult<()> {
        let plan = &self.plan;
        let limit = evaluate_limit(plan.limit.as_ref(), &ctx)?;
        // A per-span limit is only safe when no item is dropped after the scan.
        let dedup = plan.distinct && plan.spans.len() > 1;
        let mut seen = HashSet::new();
        let mut emitted = 0usize;

        for span in &plan.spans {
            if ctx.is_stopped() || limit.is_some_and(|l| emitted >= l) {
                break;
            }
            let Some(bounds) = scan_span(span, ctx.bindings())? else {
                continue;
            };
            let remaining = if dedup { None } else { limit.map(|l| l - emitted) };
            let entries = plan.index.scan(&bounds, plan.distinct, remaining)?;

            for entry in entries {
                if dedup && !seen.insert(entry.primary_key.clone()) {
                    continue;
                }
                if !out.send(json!({ "id": entry.primary_key })).await {
                    return Ok(());
                }
                emitted += 1;
                if limit.is_some_and(|l| emitted >= l) {
                    break;
                }
            }
        }
        Ok(())
    }
}

impl ExecOperator for IndexScanExec {
    fn base(&self) -> &Base {
        &self.base
    }

    fn copy(&self) -> Arc<dyn ExecOperator> {
        Arc::new(Self {
            plan: Arc::clone(&self.plan),
            base: self.base.copy(),
        })
    }

    fn run_once(self: Arc<Self>, ctx: Arc<Context>, _parent: Option<Value>) -> BoxFuture<'static, State> {
        drive(self, ctx, |op, ctx, out| op.execute(ctx, out))
    }
}

pub struct PrimaryScanExec {
    plan: Arc<PrimaryScan>,
    base: Base,
}

impl PrimaryScanExec {
    pub fn new(plan: Arc<PrimaryScan>, capacity: usize) -> Self {
        Self {
            plan,
            base: Base::new("PrimaryScan", capacity),
        }
    }

    async fn execute(self: Arc<Self>, ctx: Arc<Context>, out: Output) -> ExecutionResult<()> {
        let limit = evaluate_limit(self.plan.limit.as_ref(), &ctx)?;
        for id in self.plan.keyspace.primary_keys(limit)? {
            if !out.send(json!({ "id": id })).await {
                break;
            }
        }
        Ok(())
    }
}

impl ExecOperator for PrimaryScanExec {
    fn base(&self) -> &Base {
        &self.base
    }

    fn copy(&self) -> Arc<dyn ExecOperator> {
        Arc::new(Self {
            plan: Arc::clone(&self.plan),
            base: self.base.copy(),
        })
    }

    fn run_once(self: Arc<Self>, ctx: Arc<Context>, _parent: Option<Value>) -> BoxFuture<'static, State> {
        drive(self, ctx, |op, ctx, out| op.execute(ctx, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{Catalog, Indexer, IndexType, Keyspace, MemoryCatalog};
    use crate::execution::{start, ContextOptions};
    use crate::expr::parse;
    use crate::planner::{Inclusion, Range};

    fn fixture() -> (Arc<dyn Keyspace>, Arc<dyn crate::datastore::Index>) {
        let catalog = MemoryCatalog::new();
        let ks = catalog.add_keyspace("default", "people").unwrap();
        for (id, age) in [("p1", 25), ("p2", 31), ("p3", 35), ("p4", 42), ("p5", 31)] {
            ks.insert(id, json!({ "age": age })).unwrap();
        }
        ks.create_index("by_age", None, &[parse("age").unwrap()], None, IndexType::Gsi)
            .unwrap();
        let keyspace = catalog.keyspace("default", "people").unwrap();
        let index = keyspace
            .indexer(IndexType::Gsi)
            .unwrap()
            .index_by_name("by_age")
            .unwrap();
        (keyspace, index)
    }

    async fn drain(op: Arc<dyn ExecOperator>, ctx: &Arc<Context>) -> Vec<Value> {
        let mut input = start(&op, ctx, None).unwrap();
        let mut items = Vec::new();
        while let Some(item) = input.recv().await {
            items.push(item);
        }
        items
    }

    fn range(low: &str, high: &str, inclusion: Inclusion) -> Span {
        Span::new(Range::new(
            vec![parse(low).unwrap()],
            vec![parse(high).unwrap()],
            inclusion,
        ))
    }

    #[tokio::test]
    async fn test_index_scan_range() {
        let (keyspace, index) = fixture();
        let plan = IndexScan::new(keyspace, index, vec![range("30", "40", Inclusion::Low)]);
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        let items = drain(Arc::new(IndexScanExec::new(Arc::new(plan), 4)), &ctx).await;
        assert_eq!(items, vec![json!({"id": "p2"}), json!({"id": "p5"}), json!({"id": "p3"})]);
    }

    #[tokio::test]
    async fn test_index_scan_seek_with_parameter() {
        let (keyspace, index) = fixture();
        let span = Span::point(parse("$age").unwrap());
        let plan = IndexScan::new(keyspace, index, vec![span]);
        let ctx = Arc::new(
            Context::new(ContextOptions::default())
                .with_bindings(Bindings::new().with_named("age", json!(42))),
        );
        let items = drain(Arc::new(IndexScanExec::new(Arc::new(plan), 4)), &ctx).await;
        assert_eq!(items, vec![json!({"id": "p4"})]);
    }

    #[tokio::test]
    async fn test_missing_bound_skips_span() {
        let (keyspace, index) = fixture();
        let spans = vec![Span::point(parse("$nothing").unwrap()), Span::point(parse("25").unwrap())];
        let plan = IndexScan::new(keyspace, index, spans);
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        let items = drain(Arc::new(IndexScanExec::new(Arc::new(plan), 4)), &ctx).await;
        assert_eq!(items, vec![json!({"id": "p1"})]);
    }

    #[tokio::test]
    async fn test_distinct_across_overlapping_spans_and_limit() {
        let (keyspace, index) = fixture();
        let spans = vec![
            range("20", "35", Inclusion::Both),
            range("30", "50", Inclusion::Both),
        ];
        let plan = IndexScan::new(Arc::clone(&keyspace), Arc::clone(&index), spans.clone())
            .with_distinct(true);
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        let items = drain(Arc::new(IndexScanExec::new(Arc::new(plan), 4)), &ctx).await;
        assert_eq!(items.len(), 5);

        let limited = IndexScan::new(keyspace, index, spans)
            .with_distinct(true)
            .with_limit(parse("4").unwrap());
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        let items = drain(Arc::new(IndexScanExec::new(Arc::new(limited), 4)), &ctx).await;
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn test_primary_scan_with_limit() {
        let (keyspace, _) = fixture();
        let plan = PrimaryScan::new(keyspace).with_limit(parse("2").unwrap());
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        let items = drain(Arc::new(PrimaryScanExec::new(Arc::new(plan), 4)), &ctx).await;
        assert_eq!(items, vec![json!({"id": "p1"}), json!({"id": "p2"})]);
    }

    #[tokio::test]
    async fn test_bad_limit_fails_scan() {
        let (keyspace, _) = fixture();
        let plan = PrimaryScan::new(keyspace).with_limit(parse("'all'").unwrap());
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        let op: Arc<dyn ExecOperator> = Arc::new(PrimaryScanExec::new(Arc::new(plan), 4));
        let items = drain(Arc::clone(&op), &ctx).await;
        assert!(items.is_empty());
        assert_eq!(op.base().wait().await, State::Failed);
        assert!(ctx.first_error().is_some());
    }
}
