//! Single-input operators: fetch, filter, alias

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use super::base::{Base, Output, State};
use super::context::Context;
use super::errors::{ExecutionError, ExecutionResult};
use super::operator::{document_id, drive, start, ExecOperator};
use crate::expr::is_true;
use crate::plan::{Alias, Fetch, Filter};

fn wrap(alias: &str, value: Value) -> Value {
    let mut object = Map::with_capacity(1);
    object.insert(alias.to_string(), value);
    Value::Object(object)
}

pub struct FetchExec {
    plan: Arc<Fetch>,
    child: Arc<dyn ExecOperator>,
    base: Base,
}

impl FetchExec {
    pub fn new(plan: Arc<Fetch>, child: Arc<dyn ExecOperator>, capacity: usize) -> Self {
        Self {
            plan,
            child,
            base: Base::new("Fetch", capacity),
        }
    }

    async fn execute(self: Arc<Self>, ctx: Arc<Context>, out: Output, parent: Option<Value>) -> ExecutionResult<()> {
        let mut input = start(&self.child, &ctx, parent)?;
        while let Some(item) = input.recv().await {
            let id = document_id(&item)
                .ok_or_else(|| ExecutionError::failed(format!("fetch input has no document id: {}", item)))?
                .to_string();

            // Documents deleted since the scan are skipped.
            for (_, doc) in self.plan.keyspace.fetch(&[id])? {
                let doc = match &self.plan.alias {
                    Some(alias) => wrap(alias, doc),
                    None => doc,
                };
                if !out.send(doc).await {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

impl ExecOperator for FetchExec {
    fn base(&self) -> &Base {
        &self.base
    }

    fn copy(&self) -> Arc<dyn ExecOperator> {
        Arc::new(Self {
            plan: Arc::clone(&self.plan),
            child: self.child.copy(),
            base: self.base.copy(),
        })
    }

    fn run_once(self: Arc<Self>, ctx: Arc<Context>, parent: Option<Value>) -> BoxFuture<'static, State> {
        drive(self, ctx, move |op, ctx, out| op.execute(ctx, out, parent))
    }
}

pub struct FilterExec {
    plan: Arc<Filter>,
    child: Arc<dyn ExecOperator>,
    base: Base,
}

impl FilterExec {
    pub fn new(plan: Arc<Filter>, child: Arc<dyn ExecOperator>, capacity: usize) -> Self {
        Self {
            plan,
            child,
            base: Base::new("Filter", capacity),
        }
    }

    fn accepts(&self, ctx: &Context, item: &Value) -> ExecutionResult<bool> {
        let result = match &self.plan.alias {
            Some(alias) => {
                let doc = item.get(alias).cloned().unwrap_or(Value::Null);
                let bindings = ctx.bindings().clone().with_variable(alias.clone(), doc.clone());
                self.plan.condition.evaluate(&doc, &bindings)?
            }
            None => self.plan.condition.evaluate(item, ctx.bindings())?,
        };
        Ok(is_true(&result))
    }

    async fn execute(self: Arc<Self>, ctx: Arc<Context>, out: Output, parent: Option<Value>) -> ExecutionResult<()> {
        let mut input = start(&self.child, &ctx, parent)?;
        while let Some(item) = input.recv().await {
            if self.accepts(&ctx, &item)? && !out.send(item).await {
                break;
            }
        }
        Ok(())
    }
}

impl ExecOperator for FilterExec {
    fn base(&self) -> &Base {
        &self.base
    }

    fn copy(&self) -> Arc<dyn ExecOperator> {
        Arc::new(Self {
            plan: Arc::clone(&self.plan),
            child: self.child.copy(),
            base: self.base.copy(),
        })
    }

    fn run_once(self: Arc<Self>, ctx: Arc<Context>, parent: Option<Value>) -> BoxFuture<'static, State> {
        drive(self, ctx, move |op, ctx, out| op.execute(ctx, out, parent))
    }
}

/// Carries a label only; completes without producing items
pub struct AliasExec {
    plan: Arc<Alias>,
    base: Base,
}

impl AliasExec {
    pub fn new(plan: Arc<Alias>, capacity: usize) -> Self {
        Self {
            plan,
            base: Base::new("Alias", capacity),
        }
    }

    pub fn label(&self) -> &str {
        &self.plan.alias
    }
}

impl ExecOperator for AliasExec {
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
        drive(self, ctx, |_op, _ctx, _out| async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{Keyspace, MemoryCatalog};
    use crate::execution::scan::PrimaryScanExec;
    use crate::execution::ContextOptions;
    use crate::expr::parse;
    use crate::plan::{Operator, PrimaryScan};
    use serde_json::json;

    fn keyspace() -> Arc<dyn Keyspace> {
        let catalog = MemoryCatalog::new();
        let ks = catalog.add_keyspace("default", "people").unwrap();
        ks.insert("p1", json!({"name": "ann", "age": 25})).unwrap();
        ks.insert("p2", json!({"name": "bob", "age": 31})).unwrap();
        ks.insert("p3", json!({"name": "cat", "age": 35})).unwrap();
        ks
    }

    fn scan(ks: &Arc<dyn Keyspace>) -> Arc<dyn ExecOperator> {
        Arc::new(PrimaryScanExec::new(Arc::new(PrimaryScan::new(Arc::clone(ks))), 2))
    }

    fn fetch(ks: &Arc<dyn Keyspace>, alias: Option<&str>) -> Arc<dyn ExecOperator> {
        let plan = Fetch::new(
            Arc::clone(ks),
            alias.map(str::to_string),
            Arc::new(Operator::PrimaryScan(PrimaryScan::new(Arc::clone(ks)))),
        );
        Arc::new(FetchExec::new(Arc::new(plan), scan(ks), 2))
    }

    async fn drain(op: Arc<dyn ExecOperator>, ctx: &Arc<Context>, parent: Option<Value>) -> Vec<Value> {
        let mut input = start(&op, ctx, parent).unwrap();
        let mut items = Vec::new();
        while let Some(item) = input.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_fetch_wraps_under_alias() {
        let ks = keyspace();
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        let items = drain(fetch(&ks, Some("p")), &ctx, None).await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], json!({"p": {"name": "ann", "age": 25}}));

        let ctx = Arc::new(Context::new(ContextOptions::default()));
        let items = drain(fetch(&ks, None), &ctx, None).await;
        assert_eq!(items[2], json!({"name": "cat", "age": 35}));
    }

    #[tokio::test]
    async fn test_fetch_rejects_items_without_id() {
        let ks = keyspace();
        // Fetched documents carry no `id` field.
        let plan = Fetch::new(
            Arc::clone(&ks),
            None,
            Arc::new(Operator::PrimaryScan(PrimaryScan::new(Arc::clone(&ks)))),
        );
        let op: Arc<dyn ExecOperator> = Arc::new(FetchExec::new(Arc::new(plan), fetch(&ks, None), 2));
        let ctx = Arc::new(Context::new(ContextOptions::default()));

        let items = drain(Arc::clone(&op), &ctx, None).await;
        assert!(items.is_empty());
        assert_eq!(op.base().wait().await, State::Failed);
        assert!(ctx.first_error().unwrap().message().contains("no document id"));
    }

    #[tokio::test]
    async fn test_filter_with_alias_and_variable() {
        let ks = keyspace();
        for condition in ["age > 30", "p.age > 30"] {
            let plan = Filter::new(
                parse(condition).unwrap(),
                Some("p".into()),
                Arc::new(Operator::Alias(Alias::new("unused"))),
            );
            let op: Arc<dyn ExecOperator> =
                Arc::new(FilterExec::new(Arc::new(plan), fetch(&ks, Some("p")), 2));
            let ctx = Arc::new(Context::new(ContextOptions::default()));
            let items = drain(op, &ctx, None).await;
            assert_eq!(items.len(), 2, "condition {}", condition);
            assert_eq!(items[0]["p"]["name"], json!("bob"));
        }
    }

    #[tokio::test]
    async fn test_filter_drops_missing_and_null() {
        let ks = keyspace();
        let plan = Filter::new(
            parse("nickname = 'x'").unwrap(),
            None,
            Arc::new(Operator::Alias(Alias::new("unused"))),
        );
        let op: Arc<dyn ExecOperator> = Arc::new(FilterExec::new(Arc::new(plan), fetch(&ks, None), 2));
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        assert!(drain(op, &ctx, None).await.is_empty());
        assert!(ctx.first_error().is_none());
    }

    #[tokio::test]
    async fn test_alias_produces_no_items() {
        let alias = AliasExec::new(Arc::new(Alias::new("outer")), 2);
        assert_eq!(alias.label(), "outer");
        let op: Arc<dyn ExecOperator> = Arc::new(alias);
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        let watcher = op.base().watch();

        let items = drain(Arc::clone(&op), &ctx, Some(json!({"k": 1}))).await;
        assert!(items.is_empty());
        assert_eq!(op.base().wait().await, State::Completed);
        assert!(watcher.has_changed().unwrap());
        assert_eq!(ctx.metrics().snapshot().items_produced, 0);

        let again = op.clone().run_once(Arc::clone(&ctx), Some(json!(2))).await;
        assert_eq!(again, State::Completed);

        let fresh = op.copy();
        let ctx = Arc::new(Context::new(ContextOptions::default()));
        assert!(drain(fresh, &ctx, None).await.is_empty());
    }
}
