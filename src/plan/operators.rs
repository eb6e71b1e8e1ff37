//! Plan nodes
//!
//! A closed set of immutable operator descriptors. Children are shared
//! through `Arc`, so one compiled plan can back any number of runtime
//! instantiations.
//!
//! Storage references are resolved handles. Equality compares them by
//! name, since a decoded plan holds fresh handles for the same objects.

use std::fmt;
use std::sync::Arc;

use crate::datastore::{same_index, same_keyspace, Index, IndexType, Keyspace};
use crate::expr::Expression;
use crate::planner::Spans;

/// Discriminator of a plan node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    IndexScan,
    PrimaryScan,
    Fetch,
    Filter,
    IntersectAll,
    UnionAll,
    Alias,
    CreateIndex,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 8] = [
        OperatorKind::IndexScan,
        OperatorKind::PrimaryScan,
        OperatorKind::Fetch,
        OperatorKind::Filter,
        OperatorKind::IntersectAll,
        OperatorKind::UnionAll,
        OperatorKind::Alias,
        OperatorKind::CreateIndex,
    ];

    /// Value of the `#operator` key
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::IndexScan => "IndexScan",
            OperatorKind::PrimaryScan => "PrimaryScan",
            OperatorKind::Fetch => "Fetch",
            OperatorKind::Filter => "Filter",
            OperatorKind::IntersectAll => "IntersectAll",
            OperatorKind::UnionAll => "UnionAll",
            OperatorKind::Alias => "Alias",
            OperatorKind::CreateIndex => "CreateIndex",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Plan node
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    IndexScan(IndexScan),
    PrimaryScan(PrimaryScan),
    Fetch(Fetch),
    Filter(Filter),
    IntersectAll(IntersectAll),
    UnionAll(UnionAll),
    Alias(Alias),
    CreateIndex(CreateIndex),
}

impl Operator {
    pub fn kind(&self) -> OperatorKind {
        match self {
            Operator::IndexScan(_) => OperatorKind::IndexScan,
            Operator::PrimaryScan(_) => OperatorKind::PrimaryScan,
            Operator::Fetch(_) => OperatorKind::Fetch,
            Operator::Filter(_) => OperatorKind::Filter,
            Operator::IntersectAll(_) => OperatorKind::IntersectAll,
            Operator::UnionAll(_) => OperatorKind::UnionAll,
            Operator::Alias(_) => OperatorKind::Alias,
            Operator::CreateIndex(_) => OperatorKind::CreateIndex,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Direct inputs, in execution order
    pub fn children(&self) -> Vec<&Arc<Operator>> {
        match self {
            Operator::Fetch(op) => vec![&op.child],
            Operator::Filter(op) => vec![&op.child],
            Operator::IntersectAll(op) => vec![&op.first, &op.second],
            Operator::UnionAll(op) => op.children.iter().collect(),
            Operator::IndexScan(_)
            | Operator::PrimaryScan(_)
            | Operator::Alias(_)
            | Operator::CreateIndex(_) => Vec::new(),
        }
    }
}

/// Range scan over a secondary index; emits `{"id": ...}` items
#[derive(Debug, Clone)]
pub struct IndexScan {
    pub keyspace: Arc<dyn Keyspace>,
    pub index: Arc<dyn Index>,
    pub spans: Spans,
    /// Emit each document id at most once
    pub distinct: bool,
    pub limit: Option<Expression>,
    /// Key expressions the index can answer without a fetch
    pub covers: Vec<Expression>,
}

impl IndexScan {
    pub fn new(keyspace: Arc<dyn Keyspace>, index: Arc<dyn Index>, spans: Spans) -> Self {
        Self {
            keyspace,
            index,
            spans,
            distinct: false,
            limit: None,
            covers: Vec::new(),
        }
    }

    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn with_limit(mut self, limit: Expression) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_covers(mut self, covers: Vec<Expression>) -> Self {
        self.covers = covers;
        self
    }

    pub fn using(&self) -> IndexType {
        self.index.using()
    }
}

impl PartialEq for IndexScan {
    fn eq(&self, other: &Self) -> bool {
        same_keyspace(self.keyspace.as_ref(), other.keyspace.as_ref())
            && same_index(self.index.as_ref(), other.index.as_ref())
            && self.spans == other.spans
            && self.distinct == other.distinct
            && self.limit == other.limit
            && self.covers == other.covers
    }
}

/// Scan of every document id in key order
#[derive(Debug, Clone)]
pub struct PrimaryScan {
    pub keyspace: Arc<dyn Keyspace>,
    pub limit: Option<Expression>,
}

impl PrimaryScan {
    pub fn new(keyspace: Arc<dyn Keyspace>) -> Self {
        Self {
            keyspace,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Expression) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl PartialEq for PrimaryScan {
    fn eq(&self, other: &Self) -> bool {
        same_keyspace(self.keyspace.as_ref(), other.keyspace.as_ref()) && self.limit == other.limit
    }
}

/// Loads the documents whose ids the child emits
#[derive(Debug, Clone)]
pub struct Fetch {
    pub keyspace: Arc<dyn Keyspace>,
    /// When set, each document is emitted as `{alias: doc}`
    pub alias: Option<String>,
    pub child: Arc<Operator>,
}

impl Fetch {
    pub fn new(keyspace: Arc<dyn Keyspace>, alias: Option<String>, child: Arc<Operator>) -> Self {
        Self {
            keyspace,
            alias,
            child,
        }
    }
}

impl PartialEq for Fetch {
    fn eq(&self, other: &Self) -> bool {
        same_keyspace(self.keyspace.as_ref(), other.keyspace.as_ref())
            && self.alias == other.alias
            && self.child == other.child
    }
}

/// Residual predicate applied to every item of the child
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub condition: Expression,
    /// When set, the item is `{alias: doc}` and the alias is bound as a variable
    pub alias: Option<String>,
    pub child: Arc<Operator>,
}

impl Filter {
    pub fn new(condition: Expression, alias: Option<String>, child: Arc<Operator>) -> Self {
        Self {
            condition,
            alias,
            child,
        }
    }
}

/// Items of `first` whose document id also appears in `second`
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectAll {
    pub first: Arc<Operator>,
    pub second: Arc<Operator>,
}

impl IntersectAll {
    pub fn new(first: Arc<Operator>, second: Arc<Operator>) -> Self {
        Self { first, second }
    }
}

/// Items of every child, children in order
#[derive(Debug, Clone, PartialEq)]
pub struct UnionAll {
    pub children: Vec<Arc<Operator>>,
}

impl UnionAll {
    pub fn new(children: Vec<Arc<Operator>>) -> Self {
        Self { children }
    }
}

/// Names the parent value; produces no rows of its own
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub alias: String,
}

impl Alias {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
        }
    }
}

/// Index definition carried by `CreateIndex`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    /// Single-expression partition key
    pub partition: Option<Expression>,
    pub keys: Vec<Expression>,
    pub condition: Option<Expression>,
    pub using: IndexType,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, keys: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            partition: None,
            keys,
            condition: None,
            using: IndexType::Gsi,
        }
    }

    pub fn with_condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_partition(mut self, partition: Expression) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_using(mut self, using: IndexType) -> Self {
        self.using = using;
        self
    }
}

/// DDL node: one `create_index` call on its keyspace
#[derive(Debug, Clone)]
pub struct CreateIndex {
    pub keyspace: Arc<dyn Keyspace>,
    pub definition: Arc<IndexDefinition>,
}

impl CreateIndex {
    pub fn new(keyspace: Arc<dyn Keyspace>, definition: IndexDefinition) -> Self {
        Self {
            keyspace,
            definition: Arc::new(definition),
        }
    }
}

impl PartialEq for CreateIndex {
    fn eq(&self, other: &Self) -> bool {
        same_keyspace(self.keyspace.as_ref(), other.keyspace.as_ref())
            && self.definition == other.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        for kind in OperatorKind::ALL {
            assert_eq!(OperatorKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(OperatorKind::from_name("indexscan"), None);
        assert_eq!(Operator::Alias(Alias::new("p")).name(), "Alias");
    }

    #[test]
    fn test_children_order() {
        let a = Arc::new(Operator::Alias(Alias::new("a")));
        let b = Arc::new(Operator::Alias(Alias::new("b")));
        let op = Operator::IntersectAll(IntersectAll::new(a.clone(), b.clone()));
        let children = op.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], &a);
        assert_eq!(children[1], &b);
        assert!(Operator::Alias(Alias::new("x")).children().is_empty());
    }
}
