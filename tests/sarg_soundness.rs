//! Search-Argument Soundness Tests
//!
//! Tests for span derivation invariants:
//! - Spans never exclude a document the predicate accepts
//! - AND narrows, OR unions or gives up
//! - Constant predicates and static keys are never sargable
//! - Composite keys are bounded on the leading component only

use std::collections::BTreeSet;
use std::sync::Arc;

use docquery::datastore::{Catalog, IndexType, Indexer, Keyspace, MemoryCatalog};
use docquery::execution::{self, Context, ContextOptions};
use docquery::expr::{is_true, parse, Bindings, Expression};
use docquery::plan::{IndexScan, Operator};
use docquery::planner::{sarg_for, sarg_for_keys, Inclusion, Range, Span};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn expr(text: &str) -> Expression {
    parse(text).unwrap()
}

fn c(v: Value) -> Expression {
    Expression::constant(v)
}

/// Documents covering every collation class, plus some without `x`
fn documents() -> Vec<(String, Value)> {
    let xs = vec![
        json!(null),
        json!(false),
        json!(true),
        json!(-3),
        json!(0),
        json!(1),
        json!(2.5),
        json!(4),
        json!(5),
        json!(6),
        json!(9),
        json!(10),
        json!(11),
        json!(""),
        json!("a"),
        json!("ab"),
        json!("abc"),
        json!("abd"),
        json!("b"),
        json!([1]),
        json!({"k": 1}),
    ];
    let mut docs: Vec<(String, Value)> = xs
        .into_iter()
        .enumerate()
        .map(|(i, x)| (format!("d{:02}", i), json!({ "x": x, "y": i % 3 })))
        .collect();
    docs.push(("m01".into(), json!({ "y": 1 })));
    docs.push(("m02".into(), json!({ "z": "no x" })));
    docs
}

fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    let ks = catalog.add_keyspace("default", "docs").unwrap();
    for (id, doc) in documents() {
        ks.insert(&id, doc).unwrap();
    }
    ks.create_index("by_x", None, &[expr("x")], None, IndexType::Gsi)
        .unwrap();
    catalog
}

/// Ids the index scan visits for `spans`
fn scanned(catalog: &MemoryCatalog, spans: Vec<Span>) -> BTreeSet<String> {
    let keyspace = catalog.keyspace("default", "docs").unwrap();
    let index = keyspace
        .indexer(IndexType::Gsi)
        .unwrap()
        .index_by_name("by_x")
        .unwrap();
    let plan = Operator::IndexScan(IndexScan::new(keyspace, index, spans).with_distinct(true));

    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = Arc::new(Context::new(ContextOptions::default()));
    rt.block_on(execution::run(&plan, ctx))
        .unwrap()
        .into_iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

/// Ids of documents with `x` defined that satisfy `predicate`
fn accepted(predicate: &Expression) -> BTreeSet<String> {
    documents()
        .into_iter()
        .filter(|(_, doc)| doc.get("x").is_some())
        .filter(|(_, doc)| is_true(&predicate.evaluate(doc, &Bindings::new()).unwrap()))
        .map(|(id, _)| id)
        .collect()
}

// =============================================================================
// Soundness
// =============================================================================

/// Every accepted document lies inside the derived spans.
#[test]
fn test_spans_never_exclude_matches() {
    let catalog = catalog();
    let predicates = [
        "x = 5",
        "x > 5",
        "x >= 5",
        "x < 5",
        "x <= 5",
        "x > 5 AND x < 10",
        "x >= 4 AND x <= 4",
        "x > 1 AND y = 2",
        "x < 1 OR x > 9",
        "x = 1 OR x = 'ab'",
        "x BETWEEN 1 AND 6",
        "x IN [1, 4, 'a', true]",
        "x LIKE 'ab%'",
        "x LIKE 'a'",
        "x IS NULL",
        "x IS NOT NULL",
        "x IS VALUED",
        "NOT (x < 5)",
        "NOT (x >= 'b')",
        "x > 'a' AND x < 'b'",
        "5 < x",
        "x = false",
        "x > 100",
        "x.k = 1",
        "x.k IS NOT MISSING",
        "x.k >= 0 OR x = 'b'",
    ];

    for text in predicates {
        let predicate = expr(text);
        let Some(spans) = sarg_for(&expr("x"), &predicate) else {
            continue;
        };
        let scanned = scanned(&catalog, spans);
        let accepted = accepted(&predicate);
        assert!(
            accepted.is_subset(&scanned),
            "{}: accepted {:?} not within scanned {:?}",
            text,
            accepted,
            scanned
        );
    }
}

/// A tight range scans exactly the matching documents.
#[test]
fn test_range_scan_is_exact_for_numbers() {
    let catalog = catalog();
    let predicate = expr("x > 5 AND x < 10");
    let spans = sarg_for(&expr("x"), &predicate).unwrap();
    assert_eq!(scanned(&catalog, spans), accepted(&predicate));
}

// =============================================================================
// Span Shape
// =============================================================================

/// AND intersects ranges: x>5 AND x<10 -> low 5, high 10, NEITHER.
#[test]
fn test_and_intersection() {
    let spans = sarg_for(&expr("x"), &expr("x > 5 AND x < 10")).unwrap();
    assert_eq!(
        spans,
        vec![Span::new(Range::new(
            vec![c(json!(5))],
            vec![c(json!(10))],
            Inclusion::Neither
        ))]
    );
}

/// OR unions its operands, or gives up when one is not sargable.
#[test]
fn test_or_union_or_none() {
    let spans = sarg_for(&expr("x"), &expr("x < 1 OR x > 9")).unwrap();
    assert_eq!(spans.len(), 2);
    assert_eq!(sarg_for(&expr("x"), &expr("x < 1 OR y > 9")), None);
}

/// Equality is a point span with the seek set.
#[test]
fn test_equality_point_span() {
    let spans = sarg_for(&expr("x"), &expr("x = 'abc'")).unwrap();
    assert_eq!(spans, vec![Span::point(c(json!("abc")))]);
    assert!(spans[0].range.is_point());
}

/// Constant predicates and static keys yield nothing.
#[test]
fn test_constant_predicate_not_sargable() {
    assert_eq!(sarg_for(&expr("x"), &expr("1 = 1")), None);
    assert_eq!(sarg_for(&expr("x"), &expr("TRUE")), None);
    assert_eq!(sarg_for(&expr("1"), &expr("x = 1")), None);
}

/// Composite [x, y]: only x is bounded.
#[test]
fn test_composite_bounds_leading_key_only() {
    let keys = vec![expr("x"), expr("y")];
    let spans = sarg_for_keys(&keys, &expr("x = 1 AND y = 2")).unwrap();
    assert_eq!(spans, vec![Span::point(c(json!(1)))]);

    assert_eq!(sarg_for_keys(&keys, &expr("y = 2")), None);
    assert_eq!(sarg_for_keys(&[], &expr("y = 2")), Some(vec![Span::full()]));
}

/// Spans derived for parameters are resolved at scan time.
#[test]
fn test_parameter_bounds() {
    let spans = sarg_for(&expr("x"), &expr("x >= $lo")).unwrap();
    assert_eq!(spans[0].range.low, vec![expr("$lo")]);
    assert_eq!(spans[0].range.inclusion, Inclusion::Low);
}
