//! Plan to runtime operators

use std::sync::Arc;

use super::combine::{IntersectAllExec, UnionAllExec};
use super::ddl::CreateIndexExec;
use super::operator::ExecOperator;
use super::scan::{IndexScanExec, PrimaryScanExec};
use super::transform::{AliasExec, FetchExec, FilterExec};
use crate::plan::{
    Alias, CreateIndex, Fetch, Filter, IndexScan, IntersectAll, Operator, PlanResult, PlanVisitor,
    PrimaryScan, UnionAll,
};

/// Instantiates one runtime operator per plan node
pub struct Builder {
    capacity: usize,
}

impl Builder {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn build(&mut self, plan: &Operator) -> PlanResult<Arc<dyn ExecOperator>> {
        plan.accept(self)
    }
}

impl PlanVisitor for Builder {
    type Output = Arc<dyn ExecOperator>;

    fn visit_index_scan(&mut self, op: &IndexScan) -> PlanResult<Self::Output> {
        Ok(Arc::new(IndexScanExec::new(Arc::new(op.clone()), self.capacity)))
    }

    fn visit_primary_scan(&mut self, op: &PrimaryScan) -> PlanResult<Self::Output> {
        Ok(Arc::new(PrimaryScanExec::new(Arc::new(op.clone()), self.capacity)))
    }

    fn visit_fetch(&mut self, op: &Fetch) -> PlanResult<Self::Output> {
        let child = self.build(&op.child)?;
        Ok(Arc::new(FetchExec::new(Arc::new(op.clone()), child, self.capacity)))
    }

    fn visit_filter(&mut self, op: &Filter) -> PlanResult<Self::Output> {
        let child = self.build(&op.child)?;
        Ok(Arc::new(FilterExec::new(Arc::new(op.clone()), child, self.capacity)))
    }

    fn visit_intersect_all(&mut self, op: &IntersectAll) -> PlanResult<Self::Output> {
        let first = self.build(&op.first)?;
        let second = self.build(&op.second)?;
        Ok(Arc::new(IntersectAllExec::new(
            Arc::new(op.clone()),
            first,
            second,
            self.capacity,
        )))
    }

    fn visit_union_all(&mut self, op: &UnionAll) -> PlanResult<Self::Output> {
        let children = op
            .children
            .iter()
            .map(|child| self.build(child))
            .collect::<PlanResult<Vec<_>>>()?;
        Ok(Arc::new(UnionAllExec::new(Arc::new(op.clone()), children, self.capacity)))
    }

    fn visit_alias(&mut self, op: &Alias) -> PlanResult<Self::Output> {
        Ok(Arc::new(AliasExec::new(Arc::new(op.clone()), self.capacity)))
    }

    fn visit_create_index(&mut self, op: &CreateIndex) -> PlanResult<Self::Output> {
        Ok(Arc::new(CreateIndexExec::new(Arc::new(op.clone()), self.capacity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_matching_tree() {
        let plan = Operator::UnionAll(UnionAll::new(vec![
            Arc::new(Operator::Alias(Alias::new("a"))),
            Arc::new(Operator::Alias(Alias::new("b"))),
        ]));
        let root = Builder::new(16).build(&plan).unwrap();
        assert_eq!(root.name(), "UnionAll");
        assert_eq!(root.base().capacity(), 16);
    }
}
