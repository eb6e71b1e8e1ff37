//! Total ordering over JSON values
//!
//! Ordering across types: null < false < true < number < string < array < object.
//! Arrays compare element-wise, objects by size, then by sorted keys, then by
//! values in key order. Index keys and the comparison operators share this order.

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// Rank of a value's type in the collation order
pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// True when both values belong to the same collation type (booleans share one)
pub fn same_type(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Null, Value::Null)
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
    )
}

/// Compares two values in collation order
pub fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => collate_slices(x, y),
        (Value::Object(x), Value::Object(y)) => collate_objects(x, y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compares two sequences element-wise; a proper prefix sorts first
pub fn collate_slices(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match collate(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

fn compare_numbers(x: &serde_json::Number, y: &serde_json::Number) -> Ordering {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a.cmp(&b);
    }
    let a = x.as_f64().unwrap_or(f64::NAN);
    let b = y.as_f64().unwrap_or(f64::NAN);
    a.total_cmp(&b)
}

fn collate_objects(a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {}
        other => return other,
    }

    let mut keys_a: Vec<&String> = a.keys().collect();
    let mut keys_b: Vec<&String> = b.keys().collect();
    keys_a.sort();
    keys_b.sort();

    match keys_a.cmp(&keys_b) {
        Ordering::Equal => {}
        other => return other,
    }

    for key in keys_a {
        match collate(&a[key], &b[key]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_order() {
        let ordered = [
            json!(null),
            json!(false),
            json!(true),
            json!(-3),
            json!(2.5),
            json!(""),
            json!("a"),
            json!([]),
            json!([1]),
            json!({}),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(collate(&pair[0], &pair[1]), Ordering::Less, "{:?}", pair);
        }
    }

    #[test]
    fn test_int_and_float_compare_numerically() {
        assert_eq!(collate(&json!(1), &json!(1.0)), Ordering::Equal);
        assert_eq!(collate(&json!(2), &json!(1.5)), Ordering::Greater);
    }

    #[test]
    fn test_array_prefix_sorts_first() {
        assert_eq!(collate(&json!([1, 2]), &json!([1, 2, 0])), Ordering::Less);
        assert_eq!(collate(&json!([1, 3]), &json!([1, 2, 0])), Ordering::Greater);
    }

    #[test]
    fn test_objects_compare_by_size_first() {
        assert_eq!(
            collate(&json!({"z": 1}), &json!({"a": 1, "b": 2})),
            Ordering::Less
        );
        assert_eq!(
            collate(&json!({"a": 1}), &json!({"a": 2})),
            Ordering::Less
        );
    }
}
