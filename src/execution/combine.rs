//! Multi-input operators

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::base::{Base, Output, State};
use super::context::Context;
use super::errors::{ExecutionError, ExecutionResult};
use super::operator::{document_id, drive, start, ExecOperator};
use crate::plan::{IntersectAll, UnionAll};

fn required_id(item: &Value) -> ExecutionResult<String> {
    document_id(item)
        .map(str::to_string)
        .ok_or_else(|| ExecutionError::failed(format!("intersect input has no document id: {}", item)))
}

/// Multiset intersection of two id streams
pub struct IntersectAllExec {
    plan: Arc<IntersectAll>,
    first: Arc<dyn ExecOperator>,
    second: Arc<dyn ExecOperator>,
    base: Base,
}

impl IntersectAllExec {
    pub fn new(
        plan: Arc<IntersectAll>,
        first: Arc<dyn ExecOperator>,
        second: Arc<dyn ExecOperator>,
        capacity: usize,
    ) -> Self {
        Self {
            plan,
            first,
            second,
            base: Base::new("IntersectAll", capacity),
        }
    }

    pub fn plan(&self) -> &IntersectAll {
        &self.plan
    }

    async fn execute(self: Arc<Self>, ctx: Arc<Context>, out: Output, parent: Option<Value>) -> ExecutionResult<()> {
        // Both sides run from here on; `first` waits on backpressure while
        // `second` is counted.
        let mut first = start(&self.first, &ctx, parent.clone())?;
        let mut second = start(&self.second, &ctx, parent)?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        while let Some(item) = second.recv().await {
            *counts.entry(required_id(&item)?).or_default() += 1;
        }

        while let Some(item) = first.recv().await {
            let id = required_id(&item)?;
            let Some(count) = counts.get_mut(&id) else {
                continue;
            };
            if *count == 0 {
                continue;
            }
            *count -= 1;
            if !out.send(item).await {
                break;
            }
        }
        Ok(())
    }
}

impl ExecOperator for IntersectAllExec {
    fn base(&self) -> &Base {
        &self.base
    }

    fn copy(&self) -> Arc<dyn ExecOperator> {
        Arc::new(Self {
            plan: Arc::clone(&self.plan),
            first: self.first.copy(),
            second: self.second.copy(),
            base: self.base.copy(),
        })
    }

    fn run_once(self: Arc<Self>, ctx: Arc<Context>, parent: Option<Value>) -> BoxFuture<'static, State> {
        drive(self, ctx, move |op, ctx, out| op.execute(ctx, out, parent))
    }
}

/// Concatenation of every child's items, children in order
pub struct UnionAllExec {
    plan: Arc<UnionAll>,
    children: Vec<Arc<dyn ExecOperator>>,
    base: Base,
}

impl UnionAllExec {
    pub fn new(plan: Arc<UnionAll>, children: Vec<Arc<dyn ExecOperator>>, capacity: usize) -> Self {
        Self {
            plan,
            children,
            base: Base::new("UnionAll", capacity),
        }
    }

    pub fn plan(&self) -> &UnionAll {
        &self.plan
    }

    async fn execute(self: Arc<Self>, ctx: Arc<Context>, out: Output, parent: Option<Value>) -> ExecutionResult<()> {
        let mut inputs = Vec::with_capacity(self.children.len());
        for child in &self.children {
            inputs.push(start(child, &ctx, parent.clone())?);
        }
        for mut input in inputs {
            while let Some(item) = input.recv().await {
                if !out.send(item).await {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

impl ExecOperator for UnionAllExec {
    fn base(&self) -> &Base {
        &self.base
    }

    fn copy(&self) -> Arc<dyn ExecOperator> {
        Arc::new(Self {
            plan: Arc::clone(&self.plan),
            children: self.children.iter().map(|child| child.copy()).collect(),
            base: self.base.copy(),
        })
    }

    fn run_once(self: Arc<Self>, ctx: Arc<Context>, parent: Option<Value>) -> BoxFuture<'static, State> {
        drive(self, ctx, move |op, ctx, out| op.execute(ctx, out, parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::transform::AliasExec;
    use crate::execution::ContextOptions;
    use crate::plan::{Alias, Operator};
    use serde_json::json;
    use std::sync::Mutex;

    /// Emits a fixed list of items
    struct Items {
        items: Mutex<Option<Vec<Value>>>,
        base: Base,
    }

    impl Items {
        fn new(items: Vec<Value>) -> Arc<dyn ExecOperator> {
            Arc::new(Self {
                items: Mutex::new(Some(items)),
                base: Base::new("Items", 2),
            })
        }
    }

    impl ExecOperator for Items {
        fn base(&self) -> &Base {
            &self.base
        }

        fn copy(&self) -> Arc<dyn ExecOperator> {
            unimplemented!()
        }

        fn run_once(self: Arc<Self>, ctx: Arc<Context>, _parent: Option<Value>) -> BoxFuture<'static, State> {
            drive(self, ctx, |op, _ctx, out| async move {
                let items = op.items.lock().unwrap().take().unwrap_or_default();
                for item in items {
                    if !out.send(item).await {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    fn ids(ids: &[&str]) -> Vec<Value> {
        ids.iter().map(|id| json!({ "id": id })).collect()
    }

    fn leaf() -> Arc<Operator> {
        Arc::new(Operator::Alias(Alias::new("leaf")))
    }

    async fn drain(op: Arc<dyn ExecOperator>, ctx: &Arc<Context>) -> Vec<Value> {
        let mut input = start(&op, ctx, None).unwrap();
        let mut items = Vec::new();
        while let Some(item) = input.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_intersect_is_multiset() {
        let plan = Arc::new(IntersectAll::new(leaf(), leaf()));
        let op: Arc<dyn ExecOperator> = Arc::new(IntersectAllExec::new(
            plan,
            Items::new(ids(&["a", "b", "b", "c", "d"])),
            Items::new(ids(&["b", "d", "e", "b", "b"])),
            2,
        ));
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        assert_eq!(drain(op, &ctx).await, ids(&["b", "b", "d"]));
    }

    #[tokio::test]
    async fn test_intersect_with_large_inputs_does_not_stall() {
        let left: Vec<String> = (0..500).map(|i| format!("k{}", i)).collect();
        let right: Vec<String> = (250..750).map(|i| format!("k{}", i)).collect();
        let left: Vec<&str> = left.iter().map(String::as_str).collect();
        let right: Vec<&str> = right.iter().map(String::as_str).collect();

        let plan = Arc::new(IntersectAll::new(leaf(), leaf()));
        let op: Arc<dyn ExecOperator> =
            Arc::new(IntersectAllExec::new(plan, Items::new(ids(&left)), Items::new(ids(&right)), 2));
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        assert_eq!(drain(op, &ctx).await.len(), 250);
    }

    #[tokio::test]
    async fn test_intersect_fails_on_item_without_id() {
        let plan = Arc::new(IntersectAll::new(leaf(), leaf()));
        let op: Arc<dyn ExecOperator> = Arc::new(IntersectAllExec::new(
            plan,
            Items::new(ids(&["a"])),
            Items::new(vec![json!({"name": "no id"})]),
            2,
        ));
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        assert!(drain(Arc::clone(&op), &ctx).await.is_empty());
        assert_eq!(op.base().wait().await, State::Failed);
    }

    #[tokio::test]
    async fn test_union_keeps_child_order() {
        let plan = Arc::new(UnionAll::new(vec![leaf(), leaf(), leaf()]));
        let op: Arc<dyn ExecOperator> = Arc::new(UnionAllExec::new(
            plan,
            vec![
                Items::new(ids(&["a", "b"])),
                Arc::new(AliasExec::new(Arc::new(Alias::new("unused")), 2)),
                Items::new(ids(&["b", "c"])),
            ],
            2,
        ));
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        assert_eq!(drain(op, &ctx).await, ids(&["a", "b", "b", "c"]));
    }
}
