//! Runtime operator contract
//!
//! Every runtime operator is driven through `run_once`, given the shared
//! context and an optional value from its parent. Consumers start their
//! children with `start`, which takes the child's output and spawns the
//! child on its own task.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::base::{Base, Input, Output, State};
use super::context::Context;
use super::errors::{ExecutionError, ExecutionResult};
use crate::expr::Expression;

pub trait ExecOperator: Send + Sync {
    fn name(&self) -> &'static str {
        self.base().name()
    }

    fn base(&self) -> &Base;

    /// Same plan data, fresh runtime state, children copied too
    fn copy(&self) -> Arc<dyn ExecOperator>;

    /// Drives the operator at most once; later calls wait for the first
    fn run_once(self: Arc<Self>, ctx: Arc<Context>, parent: Option<Value>) -> BoxFuture<'static, State>;
}

/// Runs `body` under the operator's run-once guard
pub(crate) fn drive<T, F, Fut>(op: Arc<T>, ctx: Arc<Context>, body: F) -> BoxFuture<'static, State>
where
    T: ExecOperator + 'static,
    F: FnOnce(Arc<T>, Arc<Context>, Output) -> Fut + Send + 'static,
    Fut: Future<Output = ExecutionResult<()>> + Send + 'static,
{
    Box::pin(async move {
        let owner = Arc::clone(&op);
        let body_ctx = Arc::clone(&ctx);
        owner
            .base()
            .run(&ctx, move |out| body(op, body_ctx, out))
            .await
    })
}

/// Spawns `child` and returns its output
pub fn start(
    child: &Arc<dyn ExecOperator>,
    ctx: &Arc<Context>,
    parent: Option<Value>,
) -> ExecutionResult<Input> {
    let receiver = child.base().take_output().ok_or_else(|| {
        ExecutionError::internal(format!("output of {} already consumed", child.name()))
    })?;
    tokio::spawn(Arc::clone(child).run_once(Arc::clone(ctx), parent));
    Ok(Input::new(receiver, Arc::clone(ctx)))
}

/// Evaluates a row limit. MISSING or NULL means no limit.
pub(crate) fn evaluate_limit(limit: Option<&Expression>, ctx: &Context) -> ExecutionResult<Option<usize>> {
    let Some(expr) = limit else {
        return Ok(None);
    };
    match expr.evaluate(&Value::Null, ctx.bindings())? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(v) => Ok(Some(v as usize)),
            None => match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(Some(f as usize)),
                _ => Err(ExecutionError::failed(format!(
                    "limit must be a non-negative integer, got {}",
                    n
                ))),
            },
        },
        Some(other) => Err(ExecutionError::failed(format!(
            "limit must be a number, got {}",
            other
        ))),
    }
}

/// Document id carried by a scan item
pub(crate) fn document_id(item: &Value) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ContextOptions;
    use crate::expr::{parse, Bindings};
    use serde_json::json;

    #[test]
    fn test_evaluate_limit() {
        let ctx = Context::new(ContextOptions::default())
            .with_bindings(Bindings::new().with_named("n", json!(3)));
        assert_eq!(evaluate_limit(None, &ctx).unwrap(), None);
        assert_eq!(evaluate_limit(Some(&parse("10").unwrap()), &ctx).unwrap(), Some(10));
        assert_eq!(evaluate_limit(Some(&parse("$n").unwrap()), &ctx).unwrap(), Some(3));
        assert_eq!(evaluate_limit(Some(&parse("$unbound").unwrap()), &ctx).unwrap(), None);
        assert!(evaluate_limit(Some(&parse("-1").unwrap()), &ctx).is_err());
        assert!(evaluate_limit(Some(&parse("'ten'").unwrap()), &ctx).is_err());
    }

    #[test]
    fn test_document_id() {
        assert_eq!(document_id(&json!({"id": "p1"})), Some("p1"));
        assert_eq!(document_id(&json!({"id": 7})), None);
        assert_eq!(document_id(&json!("p1")), None);
    }
}
