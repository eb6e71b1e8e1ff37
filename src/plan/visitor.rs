//! Whole-plan walks
//!
//! `Operator::accept` dispatches to the visitor method for the node's
//! variant. The visitor decides whether and when to descend into children.

use super::errors::PlanResult;
use super::operators::{
    Alias, CreateIndex, Fetch, Filter, IndexScan, IntersectAll, Operator, PrimaryScan, UnionAll,
};

pub trait PlanVisitor {
    type Output;

    fn visit_index_scan(&mut self, op: &IndexScan) -> PlanResult<Self::Output>;
    fn visit_primary_scan(&mut self, op: &PrimaryScan) -> PlanResult<Self::Output>;
    fn visit_fetch(&mut self, op: &Fetch) -> PlanResult<Self::Output>;
    fn visit_filter(&mut self, op: &Filter) -> PlanResult<Self::Output>;
    fn visit_intersect_all(&mut self, op: &IntersectAll) -> PlanResult<Self::Output>;
    fn visit_union_all(&mut self, op: &UnionAll) -> PlanResult<Self::Output>;
    fn visit_alias(&mut self, op: &Alias) -> PlanResult<Self::Output>;
    fn visit_create_index(&mut self, op: &CreateIndex) -> PlanResult<Self::Output>;
}

impl Operator {
    pub fn accept<V: PlanVisitor + ?Sized>(&self, visitor: &mut V) -> PlanResult<V::Output> {
        match self {
            Operator::IndexScan(op) => visitor.visit_index_scan(op),
            Operator::PrimaryScan(op) => visitor.visit_primary_scan(op),
            Operator::Fetch(op) => visitor.visit_fetch(op),
            Operator::Filter(op) => visitor.visit_filter(op),
            Operator::IntersectAll(op) => visitor.visit_intersect_all(op),
            Operator::UnionAll(op) => visitor.visit_union_all(op),
            Operator::Alias(op) => visitor.visit_alias(op),
            Operator::CreateIndex(op) => visitor.visit_create_index(op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Counts nodes by walking children itself
    struct Counter;

    impl Counter {
        fn all(&mut self, children: &[&Arc<Operator>]) -> PlanResult<usize> {
            let mut n = 1;
            for child in children {
                n += child.accept(self)?;
            }
            Ok(n)
        }
    }

    impl PlanVisitor for Counter {
        type Output = usize;

        fn visit_index_scan(&mut self, _: &IndexScan) -> PlanResult<usize> {
            Ok(1)
        }
        fn visit_primary_scan(&mut self, _: &PrimaryScan) -> PlanResult<usize> {
            Ok(1)
        }
        fn visit_fetch(&mut self, op: &Fetch) -> PlanResult<usize> {
            self.all(&[&op.child])
        }
        fn visit_filter(&mut self, op: &Filter) -> PlanResult<usize> {
            self.all(&[&op.child])
        }
        fn visit_intersect_all(&mut self, op: &IntersectAll) -> PlanResult<usize> {
            self.all(&[&op.first, &op.second])
        }
        fn visit_union_all(&mut self, op: &UnionAll) -> PlanResult<usize> {
            let children: Vec<_> = op.children.iter().collect();
            self.all(&children)
        }
        fn visit_alias(&mut self, _: &Alias) -> PlanResult<usize> {
            Ok(1)
        }
        fn visit_create_index(&mut self, _: &CreateIndex) -> PlanResult<usize> {
            Ok(1)
        }
    }

    #[test]
    fn test_accept_dispatches_by_variant() {
        let leaf = || Arc::new(Operator::Alias(Alias::new("a")));
        let union = Operator::UnionAll(UnionAll::new(vec![
            leaf(),
            Arc::new(Operator::IntersectAll(IntersectAll::new(leaf(), leaf()))),
        ]));
        assert_eq!(union.accept(&mut Counter).unwrap(), 5);
    }
}
