//! Index creation

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::base::{Base, State};
use super::context::Context;
use super::errors::ExecutionResult;
use super::operator::{drive, ExecOperator};
use crate::observability::Logger;
use crate::plan::CreateIndex;

pub struct CreateIndexExec {
    plan: Arc<CreateIndex>,
    base: Base,
}

impl CreateIndexExec {
    pub fn new(plan: Arc<CreateIndex>, capacity: usize) -> Self {
        Self {
            plan,
            base: Base::new("CreateIndex", capacity),
        }
    }

    fn execute(&self, ctx: &Context) -> ExecutionResult<()> {
        let keyspace = &self.plan.keyspace;
        let definition = &self.plan.definition;
        let query_id = ctx.query_id().to_string();

        if ctx.readonly() {
            Logger::info(
                "CREATE_INDEX_SKIPPED_READONLY",
                &[
                    ("query_id", query_id.as_str()),
                    ("keyspace", keyspace.name()),
                    ("index", definition.name.as_str()),
                ],
            );
            return Ok(());
        }

        keyspace.create_index(
            &definition.name,
            definition.partition.as_ref(),
            &definition.keys,
            definition.condition.as_ref(),
            definition.using,
        )?;

        Logger::info(
            "INDEX_CREATED",
            &[
                ("query_id", query_id.as_str()),
                ("keyspace", keyspace.name()),
                ("index", definition.name.as_str()),
                ("using", definition.using.as_str()),
            ],
        );
        Ok(())
    }
}

impl ExecOperator for CreateIndexExec {
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
        drive(self, ctx, |op, ctx, _out| async move { op.execute(&ctx) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{Catalog, IndexType, Indexer, MemoryCatalog};
    use crate::execution::{ContextOptions, ExecutionErrorCode};
    use crate::expr::parse;
    use crate::plan::IndexDefinition;

    fn create_plan(catalog: &MemoryCatalog) -> Arc<CreateIndex> {
        let keyspace = catalog.keyspace("default", "people").unwrap();
        let definition = IndexDefinition::new("by_age", vec![parse("age").unwrap()]);
        Arc::new(CreateIndex::new(keyspace, definition))
    }

    #[tokio::test]
    async fn test_create_index() {
        let catalog = MemoryCatalog::new();
        catalog.add_keyspace("default", "people").unwrap();
        let op = Arc::new(CreateIndexExec::new(create_plan(&catalog), 1));
        let ctx = Arc::new(Context::new(ContextOptions::default()));

        assert_eq!(op.run_once(ctx, None).await, State::Completed);
        let keyspace = catalog.keyspace("default", "people").unwrap();
        assert!(keyspace.indexer(IndexType::Gsi).unwrap().index_by_name("by_age").is_ok());
    }

    #[tokio::test]
    async fn test_existing_index_fails() {
        let catalog = MemoryCatalog::new();
        catalog.add_keyspace("default", "people").unwrap();
        let plan = create_plan(&catalog);
        let ctx = Arc::new(Context::new(ContextOptions::default()));

        let first = Arc::new(CreateIndexExec::new(Arc::clone(&plan), 1));
        assert_eq!(first.run_once(Arc::clone(&ctx), None).await, State::Completed);

        let second = Arc::new(CreateIndexExec::new(plan, 1));
        assert_eq!(second.run_once(Arc::clone(&ctx), None).await, State::Failed);
        let err = ctx.first_error().unwrap();
        assert_eq!(err.code(), ExecutionErrorCode::DqExecutionStorage);
        assert_eq!(err.source_code(), Some("DQ_INDEX_EXISTS"));
    }
}
