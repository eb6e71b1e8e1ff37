//! Access planner
//!
//! Picks an access path for a single-keyspace select:
//!
//! 1. Indexes are tried per indexer, in name order.
//! 2. An index with a `WHERE` condition is eligible only when that condition
//!    is one of the predicate's conjuncts.
//! 3. The first index whose leading key sargs wins: `Filter(Fetch(IndexScan))`.
//! 4. Otherwise the plan is `Filter(Fetch(PrimaryScan))`.
//!
//! The filter always carries the whole predicate. Spans only narrow the
//! scan; they never decide a match on their own.
//!
//! Index keys are written against the bare document, so with an alias
//! `p` the planner sargs `p.age` as `age`.

use std::sync::Arc;

use super::errors::{PlannerError, PlannerResult};
use super::sarg::sarg_for_keys;
use super::spans::Spans;
use crate::datastore::{Catalog, Index, Keyspace};
use crate::expr::Expression;
use crate::observability::{Logger, MetricsRegistry};
use crate::plan::{CreateIndex, Fetch, Filter, IndexDefinition, IndexScan, Operator, PrimaryScan};

/// Knobs for `plan_select`
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Emit each document at most once from an index scan
    pub distinct: bool,
    /// Row limit, pushed into the scan only when there is no residual filter
    pub limit: Option<Expression>,
}

/// Chosen index and the spans it will scan
#[derive(Debug, Clone)]
pub struct IndexChoice {
    pub index: Arc<dyn Index>,
    pub spans: Spans,
}

/// Builds plans against live catalog state
pub struct AccessPlanner<'a> {
    catalog: &'a dyn Catalog,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<'a> AccessPlanner<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            metrics: None,
        }
    }

    /// Counts primary-scan fallbacks in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Plans `SELECT * FROM namespace:keyspace [AS alias] [WHERE predicate]`
    pub fn plan_select(
        &self,
        namespace: &str,
        keyspace: &str,
        alias: Option<&str>,
        predicate: Option<&Expression>,
        options: &SelectOptions,
    ) -> PlannerResult<Operator> {
        if alias.is_some_and(str::is_empty) {
            return Err(PlannerError::invalid_query("alias must not be empty"));
        }
        let keyspace = self.catalog.keyspace(namespace, keyspace)?;
        let alias = alias.map(str::to_string);

        let Some(predicate) = predicate else {
            let mut scan = PrimaryScan::new(keyspace.clone());
            if let Some(limit) = &options.limit {
                scan = scan.with_limit(limit.clone());
            }
            let fetch = Fetch::new(keyspace, alias, Arc::new(Operator::PrimaryScan(scan)));
            return Ok(Operator::Fetch(fetch));
        };

        let unqualified = match &alias {
            Some(alias) => unqualify(predicate, alias),
            None => predicate.clone(),
        };
        let scan = match self.choose_index(keyspace.as_ref(), &unqualified) {
            Some(choice) => {
                let scan = IndexScan::new(keyspace.clone(), choice.index, choice.spans)
                    .with_distinct(options.distinct);
                Operator::IndexScan(scan)
            }
            None => {
                Logger::info(
                    "SARG_FALLBACK",
                    &[
                        ("namespace", keyspace.namespace()),
                        ("keyspace", keyspace.name()),
                    ],
                );
                if let Some(metrics) = &self.metrics {
                    metrics.increment_sarg_fallbacks();
                }
                Operator::PrimaryScan(PrimaryScan::new(keyspace.clone()))
            }
        };

        let fetch = Fetch::new(keyspace, alias.clone(), Arc::new(scan));
        let filter = Filter::new(predicate.clone(), alias, Arc::new(Operator::Fetch(fetch)));
        Ok(Operator::Filter(filter))
    }

    /// First eligible index that bounds `predicate`
    pub fn choose_index(&self, keyspace: &dyn Keyspace, predicate: &Expression) -> Option<IndexChoice> {
        let conjuncts = predicate.conjuncts();
        for indexer in keyspace.indexers() {
            let mut indexes = indexer.indexes();
            indexes.sort_by(|a, b| a.name().cmp(b.name()));
            for index in indexes {
                if let Some(cond) = index.condition() {
                    if !conjuncts.iter().any(|c| *c == cond) {
                        continue;
                    }
                }
                if let Some(spans) = sarg_for_keys(index.range_key(), predicate) {
                    return Some(IndexChoice { index, spans });
                }
            }
        }
        None
    }

    /// Plans `CREATE INDEX name ON namespace:keyspace(keys) [WHERE condition] USING using`
    pub fn plan_create_index(
        &self,
        namespace: &str,
        keyspace: &str,
        definition: IndexDefinition,
    ) -> PlannerResult<Operator> {
        if definition.name.is_empty() {
            return Err(PlannerError::invalid_index("index name must not be empty"));
        }
        if definition.keys.is_empty() {
            return Err(PlannerError::invalid_index(format!(
                "index {} needs at least one key",
                definition.name
            )));
        }
        let keyspace = self.catalog.keyspace(namespace, keyspace)?;
        keyspace.indexer(definition.using)?;
        Ok(Operator::CreateIndex(CreateIndex::new(keyspace, definition)))
    }
}

/// Rewrites `alias.f` to `f` in the parts of a predicate the sarg
/// compiler looks into. Anything else is kept as written.
fn unqualify(expr: &Expression, alias: &str) -> Expression {
    use Expression::*;
    let un = |e: &Expression| Box::new(unqualify(e, alias));
    match expr {
        Field(base, name) => match (base.as_ref(), name.as_ref()) {
            (Identifier(root), FieldName(field)) if root == alias => Identifier(field.clone()),
            _ => Field(un(base), name.clone()),
        },
        Element(a, b) => Element(un(a), un(b)),
        Slice(a, start, end) => Slice(
            un(a),
            start.as_deref().map(un),
            end.as_deref().map(un),
        ),
        Add(a, b) => Add(un(a), un(b)),
        Sub(a, b) => Sub(un(a), un(b)),
        Mult(a, b) => Mult(un(a), un(b)),
        Div(a, b) => Div(un(a), un(b)),
        Mod(a, b) => Mod(un(a), un(b)),
        Neg(a) => Neg(un(a)),
        Concat(a, b) => Concat(un(a), un(b)),
        Eq(a, b) => Eq(un(a), un(b)),
        Lt(a, b) => Lt(un(a), un(b)),
        Le(a, b) => Le(un(a), un(b)),
        Between(a, low, high) => Between(un(a), un(low), un(high)),
        Like(a, b) => Like(un(a), un(b)),
        In(a, b) => In(un(a), un(b)),
        IsNull(a) => IsNull(un(a)),
        IsNotNull(a) => IsNotNull(un(a)),
        IsMissing(a) => IsMissing(un(a)),
        IsNotMissing(a) => IsNotMissing(un(a)),
        IsValued(a) => IsValued(un(a)),
        IsNotValued(a) => IsNotValued(un(a)),
        And(operands) => And(operands.iter().map(|o| unqualify(o, alias)).collect()),
        Or(operands) => Or(operands.iter().map(|o| unqualify(o, alias)).collect()),
        Not(a) => Not(un(a)),
        Function { name, args } => Function {
            name: name.clone(),
            args: args.iter().map(|a| unqualify(a, alias)).collect(),
        },
        other => other.clone(),
    }
}
