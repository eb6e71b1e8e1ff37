//! Search-argument compiler
//!
//! Derives index spans from a predicate for one index key expression.
//! `None` means the predicate cannot bound the key, and the caller scans
//! everything. Spans are a necessary-not-sufficient restriction: the full
//! predicate is always re-applied after the scan.
//!
//! Every rule must be sound: a document for which the predicate is true
//! and the key is defined always falls inside the returned spans.

use serde_json::Value;

use super::spans::{Inclusion, Range, Span, Spans};
use crate::expr::Expression;

/// Upper bound on spans produced by one predicate. Larger results fall back
/// to coarser spans (AND) or to no restriction (IN, OR).
pub const MAX_SPANS: usize = 1024;

/// Spans bounding `key` for documents satisfying `predicate`
pub fn sarg_for(key: &Expression, predicate: &Expression) -> Option<Spans> {
    if predicate.value().is_some() {
        return None;
    }
    let sarg = Sarg::new(key);
    if sarg.shape == KeyShape::Static {
        return None;
    }
    sarg.visit(predicate).filter(|spans| !spans.is_empty())
}

/// Spans for a composite index key. Only the leading key component is
/// bounded; an index without keys is a full scan.
pub fn sarg_for_keys(keys: &[Expression], predicate: &Expression) -> Option<Spans> {
    match keys.first() {
        None => Some(vec![Span::full()]),
        Some(leading) => sarg_for(leading, predicate),
    }
}

/// Shape of an index key expression
///
/// Comparisons against the key itself sarg the same way for every
/// non-static shape. A `Path` key additionally bounds predicates that
/// navigate into it: `a.b = 1` can only hold when `a` is an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    /// Field navigation (`a`, `a.b`, `a[0]`)
    Path,
    /// Any other expression over the document, e.g. `lower(name)`
    Computed,
    /// No document reference; cannot distinguish documents
    Static,
}

impl KeyShape {
    pub fn of(key: &Expression) -> Self {
        if key.is_static() {
            return KeyShape::Static;
        }
        match key {
            Expression::Identifier(_)
            | Expression::Field(..)
            | Expression::Element(..)
            | Expression::Slice(..) => KeyShape::Path,
            _ => KeyShape::Computed,
        }
    }
}

struct Sarg<'k> {
    key: &'k Expression,
    shape: KeyShape,
}

impl<'k> Sarg<'k> {
    fn new(key: &'k Expression) -> Self {
        Self {
            key,
            shape: KeyShape::of(key),
        }
    }

    fn is_key(&self, expr: &Expression) -> bool {
        expr == self.key
    }

    /// `key.f1.f2...` with literal field names. Only objects have fields.
    fn navigates_key(&self, expr: &Expression) -> bool {
        if self.shape != KeyShape::Path {
            return false;
        }
        match expr {
            Expression::Field(base, name) => {
                matches!(name.as_ref(), Expression::FieldName(_))
                    && (self.is_key(base) || self.navigates_key(base))
            }
            _ => false,
        }
    }

    /// Objects only, when a test that is true only for defined operands
    /// reads a field of the key
    fn key_is_object(&self, operands: &[&Expression]) -> Option<Spans> {
        operands
            .iter()
            .any(|e| self.navigates_key(e))
            .then(|| vec![objects()])
    }

    /// Operand usable as a scan bound: fixed for the whole query
    fn is_bound(expr: &Expression) -> bool {
        !matches!(expr, Expression::Missing) && expr.is_static()
    }

    fn visit(&self, pred: &Expression) -> Option<Spans> {
        use Expression::*;
        match pred {
            Eq(a, b) => {
                if self.is_key(a) && Self::is_bound(b) {
                    Some(vec![Span::point((**b).clone())])
                } else if self.is_key(b) && Self::is_bound(a) {
                    Some(vec![Span::point((**a).clone())])
                } else {
                    self.key_is_object(&[&**a, &**b])
                }
            }
            Lt(a, b) => self
                .compare(a, b, false)
                .or_else(|| self.key_is_object(&[&**a, &**b])),
            Le(a, b) => self
                .compare(a, b, true)
                .or_else(|| self.key_is_object(&[&**a, &**b])),
            Between(a, low, high) => {
                if self.is_key(a) && Self::is_bound(low) && Self::is_bound(high) {
                    Some(vec![Span::new(Range::new(
                        vec![(**low).clone()],
                        vec![(**high).clone()],
                        Inclusion::Both,
                    ))])
                } else {
                    self.key_is_object(&[&**a, &**low, &**high])
                }
            }
            Like(a, pattern) => {
                if !self.is_key(a) {
                    return self.key_is_object(&[&**a, &**pattern]);
                }
                match pattern.value() {
                    Some(Value::String(p)) => Some(vec![like_span(&p)]),
                    _ => None,
                }
            }
            In(a, list) => {
                if !self.is_key(a) {
                    return self.key_is_object(&[&**a, &**list]);
                }
                let values: Vec<Expression> = match list.as_ref() {
                    Constant(Value::Array(items)) => {
                        items.iter().cloned().map(Expression::Constant).collect()
                    }
                    ArrayConstruct(items) if items.iter().all(Self::is_bound) => items.clone(),
                    _ => return None,
                };
                if values.is_empty() || values.len() > MAX_SPANS {
                    return None;
                }
                Some(values.into_iter().map(Span::point).collect())
            }
            IsNull(a) if self.is_key(a) => Some(vec![Span::point(Expression::Constant(Value::Null))]),
            IsNotNull(a) | IsValued(a) if self.is_key(a) => Some(vec![above_null(false)]),
            IsNotMissing(a) if self.is_key(a) => Some(vec![above_null(true)]),
            // MISSING keys are never indexed
            IsMissing(_) | IsNotValued(_) => None,
            IsNull(a) | IsNotNull(a) | IsValued(a) | IsNotMissing(a) => self.key_is_object(&[&**a]),

            And(operands) => self.visit_and(operands),
            Or(operands) => {
                let mut out = Vec::new();
                for op in operands {
                    out.extend(self.visit(op)?);
                }
                (out.len() <= MAX_SPANS).then_some(out)
            }
            Not(inner) => self.visit_not(inner),

            Constant(_) | Missing | Identifier(_) | FieldName(_) | Field(..) | Element(..)
            | Slice(..) | ArrayConstruct(_) | ObjectConstruct(_) | Add(..) | Sub(..)
            | Mult(..) | Div(..) | Mod(..) | Neg(_) | Concat(..) | Within(..) | Exists(_)
            | Any { .. } | Every { .. } | Array { .. } | First { .. } | SearchedCase { .. }
            | SimpleCase { .. } | Function { .. } | Subquery(_) | NamedParameter(_)
            | PositionalParameter(_) => None,
        }
    }

    /// `a < b` or `a <= b`
    fn compare(&self, a: &Expression, b: &Expression, inclusive: bool) -> Option<Spans> {
        let range = if self.is_key(a) && Self::is_bound(b) {
            Range::new(
                Vec::new(),
                vec![b.clone()],
                Inclusion::from_bounds(false, inclusive),
            )
        } else if self.is_key(b) && Self::is_bound(a) {
            Range::new(
                vec![a.clone()],
                Vec::new(),
                Inclusion::from_bounds(inclusive, false),
            )
        } else {
            return None;
        };
        Some(vec![Span::new(range)])
    }

    fn visit_and(&self, operands: &[Expression]) -> Option<Spans> {
        let mut acc: Option<Spans> = None;
        for op in operands {
            let Some(next) = self.visit(op) else {
                continue;
            };
            acc = Some(match acc {
                None => next,
                Some(current) => intersect_all(current, next),
            });
        }
        acc
    }

    fn visit_not(&self, inner: &Expression) -> Option<Spans> {
        use Expression::*;
        match inner {
            Not(p) => self.visit(p),
            IsNull(a) => self.visit(&IsNotNull(a.clone())),
            IsNotNull(a) => self.visit(&IsNull(a.clone())),
            IsMissing(a) => self.visit(&IsNotMissing(a.clone())),
            IsNotValued(a) => self.visit(&IsValued(a.clone())),
            Lt(a, b) => self.compare(b, a, true),
            Le(a, b) => self.compare(b, a, false),
            _ => None,
        }
    }
}

/// Cross-product intersection. Past `MAX_SPANS` the smaller input is kept
/// as is, which is looser but still sound.
fn intersect_all(a: Spans, b: Spans) -> Spans {
    if a.len().saturating_mul(b.len()) > MAX_SPANS {
        return if b.len() < a.len() { b } else { a };
    }
    a.iter()
        .flat_map(|x| b.iter().map(move |y| x.intersect(y)))
        .collect()
}

/// Every non-null value, optionally including null itself
fn above_null(include_null: bool) -> Span {
    Span::new(Range::new(
        vec![Expression::Constant(Value::Null)],
        Vec::new(),
        Inclusion::from_bounds(include_null, false),
    ))
}

/// Every object. `{}` sorts first among objects, which sort last.
fn objects() -> Span {
    Span::new(Range::new(
        vec![Expression::Constant(Value::Object(serde_json::Map::new()))],
        Vec::new(),
        Inclusion::Low,
    ))
}

/// Span for `key LIKE pattern` with a constant pattern
fn like_span(pattern: &str) -> Span {
    let mut prefix = String::new();
    let mut chars = pattern.chars();
    let mut wildcard = false;
    while let Some(c) = chars.next() {
        match c {
            '%' | '_' => {
                wildcard = true;
                break;
            }
            '\\' => match chars.next() {
                Some(escaped) => prefix.push(escaped),
                None => break,
            },
            other => prefix.push(other),
        }
    }

    if !wildcard {
        return Span::point(Expression::Constant(Value::String(prefix)));
    }

    // All strings sort before arrays.
    let high = match successor(&prefix) {
        Some(next) => Value::String(next),
        None => Value::Array(Vec::new()),
    };
    Span::new(Range::new(
        vec![Expression::Constant(Value::String(prefix))],
        vec![Expression::Constant(high)],
        Inclusion::Low,
    ))
}

/// Smallest string greater than every string starting with `prefix`
fn successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut code = last as u32 + 1;
        if (0xD800..0xE000).contains(&code) {
            code = 0xE000;
        }
        if let Some(next) = char::from_u32(code) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}
