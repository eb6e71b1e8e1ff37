//! Index key ranges
//!
//! A `Span` is a candidate access path into an index: an optional exact
//! seek prefix plus a `Range` over the key components. Nothing here checks
//! a span against an actual index definition.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::expr::{collate_slices, parse, stringify, Expression};

/// Which bounds of a range are themselves matching values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Inclusion {
    Neither,
    Low,
    High,
    Both,
}

impl Inclusion {
    pub fn from_bounds(low: bool, high: bool) -> Self {
        match (low, high) {
            (false, false) => Inclusion::Neither,
            (true, false) => Inclusion::Low,
            (false, true) => Inclusion::High,
            (true, true) => Inclusion::Both,
        }
    }

    pub fn low_inclusive(self) -> bool {
        matches!(self, Inclusion::Low | Inclusion::Both)
    }

    pub fn high_inclusive(self) -> bool {
        matches!(self, Inclusion::High | Inclusion::Both)
    }
}

/// Interval over index key components.
///
/// Empty `low` is unbounded below, empty `high` unbounded above.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub low: Vec<Expression>,
    pub high: Vec<Expression>,
    pub inclusion: Inclusion,
}

impl Range {
    pub fn new(low: Vec<Expression>, high: Vec<Expression>, inclusion: Inclusion) -> Self {
        Self {
            low,
            high,
            inclusion,
        }
    }

    /// Unbounded range (full scan)
    pub fn full() -> Self {
        Self::new(Vec::new(), Vec::new(), Inclusion::Both)
    }

    /// Single-point range on `value`
    pub fn point(value: Expression) -> Self {
        Self::new(vec![value.clone()], vec![value], Inclusion::Both)
    }

    pub fn is_full(&self) -> bool {
        self.low.is_empty() && self.high.is_empty()
    }

    /// True when low and high are the same bound and both are inclusive
    pub fn is_point(&self) -> bool {
        !self.low.is_empty() && self.low == self.high && self.inclusion == Inclusion::Both
    }

    /// Narrows this range by `other`.
    ///
    /// Bounds made of constants are compared by collation. Bounds that cannot
    /// be compared at plan time keep this range's bound.
    pub fn intersect(&self, other: &Range) -> Range {
        let (low, low_incl) = tighter(
            (&self.low, self.inclusion.low_inclusive()),
            (&other.low, other.inclusion.low_inclusive()),
            Ordering::Greater,
        );
        let (high, high_incl) = tighter(
            (&self.high, self.inclusion.high_inclusive()),
            (&other.high, other.inclusion.high_inclusive()),
            Ordering::Less,
        );
        Range::new(low, high, Inclusion::from_bounds(low_incl, high_incl))
    }
}

/// Picks the tighter of two bounds; `prefer` is the ordering that makes
/// the first bound win.
fn tighter(
    a: (&Vec<Expression>, bool),
    b: (&Vec<Expression>, bool),
    prefer: Ordering,
) -> (Vec<Expression>, bool) {
    if a.0.is_empty() {
        return (b.0.clone(), b.1);
    }
    if b.0.is_empty() {
        return (a.0.clone(), a.1);
    }
    match (constants(a.0), constants(b.0)) {
        (Some(x), Some(y)) => match collate_slices(&x, &y) {
            Ordering::Equal => (a.0.clone(), a.1 && b.1),
            ord if ord == prefer => (a.0.clone(), a.1),
            _ => (b.0.clone(), b.1),
        },
        _ => (a.0.clone(), a.1),
    }
}

fn constants(exprs: &[Expression]) -> Option<Vec<Value>> {
    exprs.iter().map(Expression::value).collect()
}

/// Candidate scan: optional equality seek plus a range
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub seek: Option<Vec<Expression>>,
    pub range: Range,
}

/// Ordered span set. Scanned as a union.
pub type Spans = Vec<Span>;

impl Span {
    pub fn new(range: Range) -> Self {
        Self { seek: None, range }
    }

    pub fn full() -> Self {
        Self::new(Range::full())
    }

    /// Equality span with the seek fast path set
    pub fn point(value: Expression) -> Self {
        Self {
            seek: Some(vec![value.clone()]),
            range: Range::point(value),
        }
    }

    /// Intersects two spans. The seek survives only if the result is still
    /// the point it names.
    pub fn intersect(&self, other: &Span) -> Span {
        let range = self.range.intersect(&other.range);
        let seek = [&self.seek, &other.seek]
            .into_iter()
            .flatten()
            .find(|seek| range.is_point() && **seek == range.low)
            .cloned();
        Span { seek, range }
    }
}

// Wire form: expressions travel as canonical expression text.

#[derive(Serialize, Deserialize)]
struct RangeWire {
    #[serde(default)]
    low: Vec<String>,
    #[serde(default)]
    high: Vec<String>,
    inclusion: Inclusion,
}

#[derive(Serialize, Deserialize)]
struct SpanWire {
    #[serde(default)]
    seek: Option<Vec<String>>,
    range: RangeWire,
}

fn texts(exprs: &[Expression]) -> Vec<String> {
    exprs.iter().map(stringify).collect()
}

fn parse_all<E: serde::de::Error>(texts: Vec<String>) -> Result<Vec<Expression>, E> {
    texts
        .iter()
        .map(|t| parse(t).map_err(|e| E::custom(format!("invalid span expression '{}': {}", t, e))))
        .collect()
}

impl Serialize for Range {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RangeWire {
            low: texts(&self.low),
            high: texts(&self.high),
            inclusion: self.inclusion,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Range {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = RangeWire::deserialize(deserializer)?;
        Ok(Range {
            low: parse_all::<D::Error>(wire.low)?,
            high: parse_all::<D::Error>(wire.high)?,
            inclusion: wire.inclusion,
        })
    }
}

impl Serialize for Span {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SpanWire {
            seek: self.seek.as_deref().map(texts),
            range: RangeWire {
                low: texts(&self.range.low),
                high: texts(&self.range.high),
                inclusion: self.range.inclusion,
            },
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Span {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SpanWire::deserialize(deserializer)?;
        let seek = wire.seek.map(parse_all::<D::Error>).transpose()?;
        let range = Range {
            low: parse_all::<D::Error>(wire.range.low)?,
            high: parse_all::<D::Error>(wire.range.high)?,
            inclusion: wire.range.inclusion,
        };
        Ok(Span { seek, range })
    }
}
