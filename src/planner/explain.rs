//! Explain output
//!
//! Renders a plan as an indented tree, one node per line, children below
//! their parent. Output depends only on the plan, so equal plans explain
//! identically.

use std::fmt;

use super::spans::{Range, Span};
use crate::expr::{stringify, Expression};
use crate::plan::{
    Alias, CreateIndex, Fetch, Filter, IndexScan, IntersectAll, Operator, PlanResult, PlanVisitor,
    PrimaryScan, UnionAll,
};

/// Explain plan output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainPlan {
    lines: Vec<String>,
}

impl ExplainPlan {
    /// Creates an explain plan from an operator tree
    pub fn from_plan(plan: &Operator) -> PlanResult<Self> {
        let mut walker = Explainer {
            depth: 0,
            lines: Vec::new(),
        };
        plan.accept(&mut walker)?;
        Ok(Self {
            lines: walker.lines,
        })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

fn list(exprs: &[Expression]) -> String {
    exprs.iter().map(stringify).collect::<Vec<_>>().join(", ")
}

fn bound(exprs: &[Expression]) -> String {
    format!("[{}]", list(exprs))
}

fn range_text(range: &Range) -> String {
    let low = if range.low.is_empty() {
        "-inf".to_string()
    } else {
        list(&range.low)
    };
    let high = if range.high.is_empty() {
        "+inf".to_string()
    } else {
        list(&range.high)
    };
    let open = if range.inclusion.low_inclusive() { '[' } else { '(' };
    let close = if range.inclusion.high_inclusive() { ']' } else { ')' };
    format!("{}{} .. {}{}", open, low, high, close)
}

fn span_text(span: &Span) -> String {
    match &span.seek {
        Some(seek) => format!("seek {}", bound(seek)),
        None => range_text(&span.range),
    }
}

fn alias_text(alias: &Option<String>) -> String {
    alias
        .as_ref()
        .map(|a| format!(" as {}", a))
        .unwrap_or_default()
}

struct Explainer {
    depth: usize,
    lines: Vec<String>,
}

impl Explainer {
    fn line(&mut self, text: String) {
        self.lines.push(format!("{}{}", "  ".repeat(self.depth), text));
    }

    fn nested(&mut self, children: &[&Operator]) -> PlanResult<()> {
        self.depth += 1;
        for child in children {
            child.accept(self)?;
        }
        self.depth -= 1;
        Ok(())
    }
}

impl PlanVisitor for Explainer {
    type Output = ();

    fn visit_index_scan(&mut self, op: &IndexScan) -> PlanResult<()> {
        let mut text = format!(
            "IndexScan {} on {}:{} using {}",
            op.index.name(),
            op.keyspace.namespace(),
            op.keyspace.name(),
            op.using()
        );
        if op.distinct {
            text.push_str(" distinct");
        }
        if let Some(limit) = &op.limit {
            text.push_str(&format!(" limit {}", stringify(limit)));
        }
        self.line(text);
        self.depth += 1;
        for span in &op.spans {
            self.line(format!("span {}", span_text(span)));
        }
        if !op.covers.is_empty() {
            self.line(format!("covers {}", bound(&op.covers)));
        }
        self.depth -= 1;
        Ok(())
    }

    fn visit_primary_scan(&mut self, op: &PrimaryScan) -> PlanResult<()> {
        let mut text = format!(
            "PrimaryScan on {}:{}",
            op.keyspace.namespace(),
            op.keyspace.name()
        );
        if let Some(limit) = &op.limit {
            text.push_str(&format!(" limit {}", stringify(limit)));
        }
        self.line(text);
        Ok(())
    }

    fn visit_fetch(&mut self, op: &Fetch) -> PlanResult<()> {
        self.line(format!(
            "Fetch {}:{}{}",
            op.keyspace.namespace(),
            op.keyspace.name(),
            alias_text(&op.alias)
        ));
        self.nested(&[op.child.as_ref()])
    }

    fn visit_filter(&mut self, op: &Filter) -> PlanResult<()> {
        self.line(format!(
            "Filter {}{}",
            stringify(&op.condition),
            alias_text(&op.alias)
        ));
        self.nested(&[op.child.as_ref()])
    }

    fn visit_intersect_all(&mut self, op: &IntersectAll) -> PlanResult<()> {
        self.line("IntersectAll".to_string());
        self.nested(&[op.first.as_ref(), op.second.as_ref()])
    }

    fn visit_union_all(&mut self, op: &UnionAll) -> PlanResult<()> {
        self.line("UnionAll".to_string());
        let children: Vec<&Operator> = op.children.iter().map(|c| c.as_ref()).collect();
        self.nested(&children)
    }

    fn visit_alias(&mut self, op: &Alias) -> PlanResult<()> {
        self.line(format!("Alias {}", op.alias));
        Ok(())
    }

    fn visit_create_index(&mut self, op: &CreateIndex) -> PlanResult<()> {
        let def = &op.definition;
        let mut text = format!(
            "CreateIndex {} on {}:{}{} using {}",
            def.name,
            op.keyspace.namespace(),
            op.keyspace.name(),
            bound(&def.keys),
            def.using
        );
        if let Some(partition) = &def.partition {
            text.push_str(&format!(" partition {}", stringify(partition)));
        }
        if let Some(cond) = &def.condition {
            text.push_str(&format!(" where {}", stringify(cond)));
        }
        self.line(text);
        Ok(())
    }
}
