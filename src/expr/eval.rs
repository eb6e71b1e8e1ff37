//! Expression evaluation
//!
//! `evaluate` returns `Ok(None)` for MISSING. NULL is `Some(Value::Null)`.
//! Logic follows three-valued rules extended with MISSING:
//! - AND: any FALSE → FALSE, else any MISSING → MISSING, else any NULL → NULL
//! - OR: any TRUE → TRUE, else any NULL → NULL, else any MISSING → MISSING

use std::cmp::Ordering;
use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{json, Map, Value};

use super::ast::{Binding, Expression, WhenThen};
use super::collation::{collate, same_type};
use super::errors::{ExprError, ExprResult};

/// Parameter and variable values visible during evaluation
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    named: BTreeMap<String, Value>,
    positional: Vec<Value>,
    variables: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a named parameter (`$name`)
    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    /// Sets positional parameters (`$1`, `$2`, ...)
    pub fn with_positional(mut self, values: Vec<Value>) -> Self {
        self.positional = values;
        self
    }

    /// Binds a variable, shadowing document fields of the same name
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    fn bind(&self, name: &str, value: Value) -> Bindings {
        self.clone().with_variable(name, value)
    }
}

/// Truth value of a non-missing value. `None` means NULL.
pub fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => Some(!s.is_empty()),
        Value::Array(a) => Some(!a.is_empty()),
        Value::Object(o) => Some(!o.is_empty()),
    }
}

/// True only when the result is exactly TRUE
pub fn is_true(result: &Option<Value>) -> bool {
    matches!(result.as_ref().and_then(truth), Some(true))
}

fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        json!(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl Expression {
    /// Evaluates the expression against a document
    pub fn evaluate(&self, item: &Value, bindings: &Bindings) -> ExprResult<Option<Value>> {
        use Expression::*;
        match self {
            Constant(v) => Ok(Some(v.clone())),
            Missing => Ok(None),
            Identifier(name) => Ok(bindings
                .variables
                .get(name)
                .or_else(|| item.get(name))
                .cloned()),
            FieldName(name) => Ok(Some(Value::String(name.clone()))),
            Field(base, name) => {
                let Some(base) = base.evaluate(item, bindings)? else {
                    return Ok(None);
                };
                let key = match name.as_ref() {
                    FieldName(n) => n.clone(),
                    other => match other.evaluate(item, bindings)? {
                        Some(Value::String(s)) => s,
                        _ => return Ok(None),
                    },
                };
                Ok(base.get(&key).cloned())
            }
            Element(base, index) => {
                let base = base.evaluate(item, bindings)?;
                let index = index.evaluate(item, bindings)?;
                Ok(match (base, index) {
                    (None, _) | (_, None) => None,
                    (Some(Value::Array(items)), Some(Value::Number(n))) => {
                        n.as_i64().and_then(|i| array_index(items.len(), i)).map(|i| items[i].clone())
                    }
                    (Some(Value::Object(fields)), Some(Value::String(key))) => fields.get(&key).cloned(),
                    (Some(Value::Null), _) => Some(Value::Null),
                    _ => None,
                })
            }
            Slice(base, start, end) => self.evaluate_slice(base, start.as_deref(), end.as_deref(), item, bindings),
            ArrayConstruct(items) => {
                let mut out = Vec::with_capacity(items.len());
                for e in items {
                    out.push(e.evaluate(item, bindings)?.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(out)))
            }
            ObjectConstruct(pairs) => {
                let mut out = Map::new();
                for (key, e) in pairs {
                    if let Some(v) = e.evaluate(item, bindings)? {
                        out.insert(key.clone(), v);
                    }
                }
                Ok(Some(Value::Object(out)))
            }
            Add(a, b) => arithmetic(a, b, item, bindings, |x, y| Some(x + y)),
            Sub(a, b) => arithmetic(a, b, item, bindings, |x, y| Some(x - y)),
            Mult(a, b) => arithmetic(a, b, item, bindings, |x, y| Some(x * y)),
            Div(a, b) => arithmetic(a, b, item, bindings, |x, y| (y != 0.0).then(|| x / y)),
            Mod(a, b) => arithmetic(a, b, item, bindings, |x, y| (y != 0.0).then(|| x % y)),
            Neg(a) => Ok(match a.evaluate(item, bindings)? {
                None => None,
                Some(Value::Number(n)) => Some(n.as_f64().map(|f| number(-f)).unwrap_or(Value::Null)),
                Some(_) => Some(Value::Null),
            }),
            Concat(a, b) => {
                let a = a.evaluate(item, bindings)?;
                let b = b.evaluate(item, bindings)?;
                Ok(match (a, b) {
                    (None, _) | (_, None) => None,
                    (Some(Value::String(x)), Some(Value::String(y))) => Some(Value::String(x + &y)),
                    _ => Some(Value::Null),
                })
            }
            Eq(a, b) => compare(a, b, item, bindings, |x, y| same_type(x, y) && collate(x, y) == Ordering::Equal),
            Lt(a, b) => compare(a, b, item, bindings, |x, y| collate(x, y) == Ordering::Less),
            Le(a, b) => compare(a, b, item, bindings, |x, y| collate(x, y) != Ordering::Greater),
            Between(a, low, high) => {
                let lower = Expression::Le(low.clone(), a.clone());
                let upper = Expression::Le(a.clone(), high.clone());
                Expression::And(vec![lower, upper]).evaluate(item, bindings)
            }
            Like(a, pattern) => {
                let a = a.evaluate(item, bindings)?;
                let pattern = pattern.evaluate(item, bindings)?;
                match (a, pattern) {
                    (None, _) | (_, None) => Ok(None),
                    (Some(Value::String(s)), Some(Value::String(p))) => {
                        let re = like_regex(&p)?;
                        Ok(Some(Value::Bool(re.is_match(&s))))
                    }
                    _ => Ok(Some(Value::Null)),
                }
            }
            IsNull(a) => Ok(a.evaluate(item, bindings)?.map(|v| Value::Bool(v.is_null()))),
            IsNotNull(a) => Ok(a.evaluate(item, bindings)?.map(|v| Value::Bool(!v.is_null()))),
            IsMissing(a) => Ok(Some(Value::Bool(a.evaluate(item, bindings)?.is_none()))),
            IsNotMissing(a) => Ok(Some(Value::Bool(a.evaluate(item, bindings)?.is_some()))),
            IsValued(a) => Ok(Some(Value::Bool(matches!(
                a.evaluate(item, bindings)?,
                Some(ref v) if !v.is_null()
            )))),
            IsNotValued(a) => Ok(Some(Value::Bool(!matches!(
                a.evaluate(item, bindings)?,
                Some(ref v) if !v.is_null()
            )))),
            In(a, list) => {
                let a = a.evaluate(item, bindings)?;
                let list = list.evaluate(item, bindings)?;
                Ok(match (a, list) {
                    (None, _) | (_, None) => None,
                    (Some(Value::Null), _) => Some(Value::Null),
                    (Some(v), Some(Value::Array(items))) => Some(Value::Bool(
                        items.iter().any(|x| same_type(&v, x) && collate(&v, x) == Ordering::Equal),
                    )),
                    _ => Some(Value::Null),
                })
            }
            Within(a, container) => {
                let a = a.evaluate(item, bindings)?;
                let container = container.evaluate(item, bindings)?;
                Ok(match (a, container) {
                    (None, _) | (_, None) => None,
                    (Some(v), Some(c @ (Value::Array(_) | Value::Object(_)))) => {
                        Some(Value::Bool(descendants(&c).any(|d| same_type(&v, d) && collate(&v, d) == Ordering::Equal)))
                    }
                    _ => Some(Value::Null),
                })
            }
            Exists(a) => Ok(match a.evaluate(item, bindings)? {
                None => None,
                Some(Value::Array(items)) => Some(Value::Bool(!items.is_empty())),
                Some(_) => Some(Value::Bool(false)),
            }),
            Any { binding, satisfies } => {
                let Some(items) = collection(binding, item, bindings)? else {
                    return Ok(None);
                };
                let Some(items) = items else {
                    return Ok(Some(Value::Null));
                };
                for v in items {
                    let scope = bindings.bind(&binding.variable, v);
                    if is_true(&satisfies.evaluate(item, &scope)?) {
                        return Ok(Some(Value::Bool(true)));
                    }
                }
                Ok(Some(Value::Bool(false)))
            }
            Every { binding, satisfies } => {
                let Some(items) = collection(binding, item, bindings)? else {
                    return Ok(None);
                };
                let Some(items) = items else {
                    return Ok(Some(Value::Null));
                };
                for v in items {
                    let scope = bindings.bind(&binding.variable, v);
                    if !is_true(&satisfies.evaluate(item, &scope)?) {
                        return Ok(Some(Value::Bool(false)));
                    }
                }
                Ok(Some(Value::Bool(true)))
            }
            Array { mapping, binding, when } => {
                let Some(items) = collection(binding, item, bindings)? else {
                    return Ok(None);
                };
                let Some(items) = items else {
                    return Ok(Some(Value::Null));
                };
                let mut out = Vec::new();
                for v in items {
                    let scope = bindings.bind(&binding.variable, v);
                    if let Some(when) = when {
                        if !is_true(&when.evaluate(item, &scope)?) {
                            continue;
                        }
                    }
                    if let Some(m) = mapping.evaluate(item, &scope)? {
                        out.push(m);
                    }
                }
                Ok(Some(Value::Array(out)))
            }
            First { mapping, binding, when } => {
                let Some(Some(items)) = collection(binding, item, bindings)? else {
                    return Ok(None);
                };
                for v in items {
                    let scope = bindings.bind(&binding.variable, v);
                    if let Some(when) = when {
                        if !is_true(&when.evaluate(item, &scope)?) {
                            continue;
                        }
                    }
                    return mapping.evaluate(item, &scope);
                }
                Ok(None)
            }
            SearchedCase { whens, otherwise } => {
                for WhenThen { when, then } in whens {
                    if is_true(&when.evaluate(item, bindings)?) {
                        return then.evaluate(item, bindings);
                    }
                }
                otherwise_value(otherwise.as_deref(), item, bindings)
            }
            SimpleCase { search, whens, otherwise } => {
                let search = search.evaluate(item, bindings)?;
                if let Some(search) = search {
                    for WhenThen { when, then } in whens {
                        if let Some(candidate) = when.evaluate(item, bindings)? {
                            if same_type(&search, &candidate) && collate(&search, &candidate) == Ordering::Equal {
                                return then.evaluate(item, bindings);
                            }
                        }
                    }
                }
                otherwise_value(otherwise.as_deref(), item, bindings)
            }
            And(operands) => {
                let mut missing = false;
                let mut null = false;
                for op in operands {
                    match op.evaluate(item, bindings)? {
                        None => missing = true,
                        Some(v) => match truth(&v) {
                            Some(false) => return Ok(Some(Value::Bool(false))),
                            Some(true) => {}
                            None => null = true,
                        },
                    }
                }
                Ok(if missing {
                    None
                } else if null {
                    Some(Value::Null)
                } else {
                    Some(Value::Bool(true))
                })
            }
            Or(operands) => {
                let mut missing = false;
                let mut null = false;
                for op in operands {
                    match op.evaluate(item, bindings)? {
                        None => missing = true,
                        Some(v) => match truth(&v) {
                            Some(true) => return Ok(Some(Value::Bool(true))),
                            Some(false) => {}
                            None => null = true,
                        },
                    }
                }
                Ok(if null {
                    Some(Value::Null)
                } else if missing {
                    None
                } else {
                    Some(Value::Bool(false))
                })
            }
            Not(a) => Ok(match a.evaluate(item, bindings)? {
                None => None,
                Some(v) => Some(truth(&v).map(|b| Value::Bool(!b)).unwrap_or(Value::Null)),
            }),
            Function { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(a.evaluate(item, bindings)?);
                }
                call_function(name, values)
            }
            Subquery(_) => Err(ExprError::evaluation("subqueries cannot be evaluated here")),
            // An unbound parameter is MISSING.
            NamedParameter(name) => Ok(bindings.named.get(name).cloned()),
            PositionalParameter(position) => Ok(position
                .checked_sub(1)
                .and_then(|i| bindings.positional.get(i))
                .cloned()),
        }
    }

    fn evaluate_slice(
        &self,
        base: &Expression,
        start: Option<&Expression>,
        end: Option<&Expression>,
        item: &Value,
        bindings: &Bindings,
    ) -> ExprResult<Option<Value>> {
        let Some(base) = base.evaluate(item, bindings)? else {
            return Ok(None);
        };
        let Value::Array(items) = base else {
            return Ok(Some(Value::Null));
        };
        let len = items.len() as i64;
        let bound = |e: Option<&Expression>, default: i64| -> ExprResult<Option<i64>> {
            match e {
                None => Ok(Some(default)),
                Some(e) => Ok(e
                    .evaluate(item, bindings)?
                    .and_then(|v| v.as_i64())
                    .map(|i| if i < 0 { i + len } else { i })),
            }
        };
        let (Some(s), Some(e)) = (bound(start, 0)?, bound(end, len)?) else {
            return Ok(None);
        };
        if s < 0 || e > len || s > e {
            return Ok(None);
        }
        Ok(Some(Value::Array(items[s as usize..e as usize].to_vec())))
    }
}

fn array_index(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn arithmetic(
    a: &Expression,
    b: &Expression,
    item: &Value,
    bindings: &Bindings,
    op: impl Fn(f64, f64) -> Option<f64>,
) -> ExprResult<Option<Value>> {
    let a = a.evaluate(item, bindings)?;
    let b = b.evaluate(item, bindings)?;
    Ok(match (a, b) {
        (None, _) | (_, None) => None,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => Some(op(x, y).map(number).unwrap_or(Value::Null)),
                _ => Some(Value::Null),
            }
        }
        _ => Some(Value::Null),
    })
}

fn compare(
    a: &Expression,
    b: &Expression,
    item: &Value,
    bindings: &Bindings,
    op: impl Fn(&Value, &Value) -> bool,
) -> ExprResult<Option<Value>> {
    let a = a.evaluate(item, bindings)?;
    let b = b.evaluate(item, bindings)?;
    Ok(match (a, b) {
        (None, _) | (_, None) => None,
        (Some(Value::Null), _) | (_, Some(Value::Null)) => Some(Value::Null),
        (Some(x), Some(y)) => Some(Value::Bool(op(&x, &y))),
    })
}

/// `Ok(None)` = MISSING, `Ok(Some(None))` = not an array
fn collection(
    binding: &Binding,
    item: &Value,
    bindings: &Bindings,
) -> ExprResult<Option<Option<Vec<Value>>>> {
    Ok(match binding.expr.evaluate(item, bindings)? {
        None => None,
        Some(Value::Array(items)) => Some(Some(items)),
        Some(_) => Some(None),
    })
}

fn otherwise_value(
    otherwise: Option<&Expression>,
    item: &Value,
    bindings: &Bindings,
) -> ExprResult<Option<Value>> {
    match otherwise {
        Some(e) => e.evaluate(item, bindings),
        None => Ok(Some(Value::Null)),
    }
}

fn descendants(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter().flat_map(|v| std::iter::once(v).chain(descendants(v)))),
        Value::Object(fields) => Box::new(fields.values().flat_map(|v| std::iter::once(v).chain(descendants(v)))),
        _ => Box::new(std::iter::empty()),
    }
}

/// Translates a LIKE pattern into an anchored regular expression.
///
/// `%` matches any run of characters, `_` exactly one, `\` escapes the next character.
pub fn like_regex(pattern: &str) -> ExprResult<Regex> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| ExprError::evaluation(format!("Invalid LIKE pattern: {}", e)))
}

fn call_function(name: &str, args: Vec<Option<Value>>) -> ExprResult<Option<Value>> {
    let expect = |n: usize| -> ExprResult<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(ExprError::Arity {
                name: name.to_string(),
                expected: n,
                actual: args.len(),
            })
        }
    };

    match name {
        "lower" | "upper" => {
            expect(1)?;
            Ok(args[0].as_ref().map(|v| match v {
                Value::String(s) if name == "lower" => Value::String(s.to_lowercase()),
                Value::String(s) => Value::String(s.to_uppercase()),
                _ => Value::Null,
            }))
        }
        "length" => {
            expect(1)?;
            Ok(args[0].as_ref().map(|v| match v {
                Value::String(s) => json!(s.chars().count()),
                _ => Value::Null,
            }))
        }
        "array_length" => {
            expect(1)?;
            Ok(args[0].as_ref().map(|v| match v {
                Value::Array(items) => json!(items.len()),
                _ => Value::Null,
            }))
        }
        "abs" | "ceil" | "floor" | "round" => {
            expect(1)?;
            Ok(args[0].as_ref().map(|v| match v.as_f64() {
                Some(f) if v.is_number() => number(match name {
                    "abs" => f.abs(),
                    "ceil" => f.ceil(),
                    "floor" => f.floor(),
                    _ => f.round(),
                }),
                _ => Value::Null,
            }))
        }
        "contains" => {
            expect(2)?;
            Ok(match (&args[0], &args[1]) {
                (None, _) | (_, None) => None,
                (Some(Value::String(s)), Some(Value::String(sub))) => Some(Value::Bool(s.contains(sub.as_str()))),
                _ => Some(Value::Null),
            })
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    fn eval(text: &str, doc: Value) -> Option<Value> {
        parse(text).unwrap().evaluate(&doc, &Bindings::default()).unwrap()
    }

    #[test]
    fn test_missing_and_null_propagation() {
        let doc = json!({"a": null});
        assert_eq!(eval("a = 1", doc.clone()), Some(Value::Null));
        assert_eq!(eval("b = 1", doc.clone()), None);
        assert_eq!(eval("b IS MISSING", doc.clone()), Some(json!(true)));
        assert_eq!(eval("a IS NULL", doc), Some(json!(true)));
    }

    #[test]
    fn test_cross_type_comparison_uses_collation() {
        let doc = json!({"x": "abc"});
        assert_eq!(eval("x > 10", doc.clone()), Some(json!(true)));
        assert_eq!(eval("x = 10", doc), Some(json!(false)));
    }

    #[test]
    fn test_and_or_three_valued() {
        let doc = json!({"a": 1});
        assert_eq!(eval("a = 2 AND b = 1", doc.clone()), Some(json!(false)));
        assert_eq!(eval("a = 1 AND b = 1", doc.clone()), None);
        assert_eq!(eval("a = 1 OR b = 1", doc.clone()), Some(json!(true)));
        assert_eq!(eval("a = 2 OR b = 1", doc), None);
    }

    #[test]
    fn test_like_pattern() {
        let doc = json!({"name": "alice_1"});
        assert_eq!(eval("name LIKE \"ali%\"", doc.clone()), Some(json!(true)));
        assert_eq!(eval("name LIKE \"alice\\\\_%\"", doc.clone()), Some(json!(true)));
        assert_eq!(eval("name LIKE \"b%\"", doc), Some(json!(false)));
    }

    #[test]
    fn test_collection_predicates() {
        let doc = json!({"tags": [1, 5, 9]});
        assert_eq!(eval("ANY t IN tags SATISFIES t > 8 END", doc.clone()), Some(json!(true)));
        assert_eq!(eval("EVERY t IN tags SATISFIES t > 8 END", doc.clone()), Some(json!(false)));
        assert_eq!(eval("ARRAY t * 2 FOR t IN tags WHEN t > 1 END", doc.clone()), Some(json!([10, 18])));
        assert_eq!(eval("FIRST t FOR t IN tags WHEN t > 1 END", doc.clone()), Some(json!(5)));
        assert_eq!(eval("5 IN tags", doc), Some(json!(true)));
    }

    #[test]
    fn test_parameters() {
        let expr = parse("x >= $min AND x < $2").unwrap();
        let bindings = Bindings::new()
            .with_named("min", json!(3))
            .with_positional(vec![json!(0), json!(10)]);
        let result = expr.evaluate(&json!({"x": 5}), &bindings).unwrap();
        assert_eq!(result, Some(json!(true)));

        assert_eq!(expr.evaluate(&json!({"x": 5}), &Bindings::default()).unwrap(), None);
        assert_eq!(parse("$3").unwrap().evaluate(&json!({}), &bindings).unwrap(), None);
    }

    #[test]
    fn test_functions() {
        let doc = json!({"name": "Bob"});
        assert_eq!(eval("lower(name)", doc.clone()), Some(json!("bob")));
        assert_eq!(eval("length(name)", doc.clone()), Some(json!(3)));
        let err = parse("nope(name)").unwrap().evaluate(&doc, &Bindings::default()).unwrap_err();
        assert_eq!(err, ExprError::UnknownFunction("nope".into()));
    }

    #[test]
    fn test_navigation() {
        let doc = json!({"a": {"b": [10, 20, 30]}});
        assert_eq!(eval("a.b[1]", doc.clone()), Some(json!(20)));
        assert_eq!(eval("a.b[-1]", doc.clone()), Some(json!(30)));
        assert_eq!(eval("a.b[1:3]", doc.clone()), Some(json!([20, 30])));
        assert_eq!(eval("a.c", doc), None);
    }
}
