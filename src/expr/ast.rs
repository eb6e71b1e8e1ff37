//! Expression tree
//!
//! A closed, immutable AST over document fields. Consumers (sarg compiler,
//! evaluator, stringer) dispatch with an exhaustive `match`.
//!
//! Comparisons are normalised the way the parser produces them: `a > b` is
//! `Lt(b, a)`, `a >= b` is `Le(b, a)` and `a != b` is `Not(Eq(a, b))`.

use serde_json::Value;

use super::eval::Bindings;

/// Range variable introduced by a collection expression (`v IN expr`)
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Variable name
    pub variable: String,
    /// Collection the variable ranges over
    pub expr: Box<Expression>,
}

impl Binding {
    pub fn new(variable: impl Into<String>, expr: Expression) -> Self {
        Self {
            variable: variable.into(),
            expr: Box::new(expr),
        }
    }
}

/// `WHEN condition THEN result` arm of a CASE expression
#[derive(Debug, Clone, PartialEq)]
pub struct WhenThen {
    pub when: Expression,
    pub then: Expression,
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    // Constant
    /// Literal value
    Constant(Value),
    /// The MISSING literal
    Missing,

    // Identifier
    /// Top-level field or bound variable
    Identifier(String),

    // Navigation
    /// `base.name`; the name is usually a `FieldName`
    Field(Box<Expression>, Box<Expression>),
    /// Static field name inside a `Field`
    FieldName(String),
    /// `base[index]`
    Element(Box<Expression>, Box<Expression>),
    /// `base[start:end]`
    Slice(
        Box<Expression>,
        Option<Box<Expression>>,
        Option<Box<Expression>>,
    ),

    // Construction
    ArrayConstruct(Vec<Expression>),
    ObjectConstruct(Vec<(String, Expression)>),

    // Arithmetic
    Add(Box<Expression>, Box<Expression>),
    Sub(Box<Expression>, Box<Expression>),
    Mult(Box<Expression>, Box<Expression>),
    Div(Box<Expression>, Box<Expression>),
    Mod(Box<Expression>, Box<Expression>),
    Neg(Box<Expression>),

    // Concat
    Concat(Box<Expression>, Box<Expression>),

    // Comparison
    Eq(Box<Expression>, Box<Expression>),
    Lt(Box<Expression>, Box<Expression>),
    Le(Box<Expression>, Box<Expression>),
    Between(Box<Expression>, Box<Expression>, Box<Expression>),
    Like(Box<Expression>, Box<Expression>),
    IsNull(Box<Expression>),
    IsNotNull(Box<Expression>),
    IsMissing(Box<Expression>),
    IsNotMissing(Box<Expression>),
    IsValued(Box<Expression>),
    IsNotValued(Box<Expression>),

    // Collection
    In(Box<Expression>, Box<Expression>),
    Within(Box<Expression>, Box<Expression>),
    Exists(Box<Expression>),
    Any {
        binding: Binding,
        satisfies: Box<Expression>,
    },
    Every {
        binding: Binding,
        satisfies: Box<Expression>,
    },
    Array {
        mapping: Box<Expression>,
        binding: Binding,
        when: Option<Box<Expression>>,
    },
    First {
        mapping: Box<Expression>,
        binding: Binding,
        when: Option<Box<Expression>>,
    },

    // Case
    SearchedCase {
        whens: Vec<WhenThen>,
        otherwise: Option<Box<Expression>>,
    },
    SimpleCase {
        search: Box<Expression>,
        whens: Vec<WhenThen>,
        otherwise: Option<Box<Expression>>,
    },

    // Logic
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),

    // Opaque
    Function {
        name: String,
        args: Vec<Expression>,
    },
    /// Subquery text, never evaluated by this crate
    Subquery(String),
    NamedParameter(String),
    /// 1-based positional parameter
    PositionalParameter(usize),
}

impl Expression {
    pub fn constant(value: Value) -> Self {
        Expression::Constant(value)
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expression::Identifier(name.into())
    }

    /// `base.name`
    pub fn field(base: Expression, name: impl Into<String>) -> Self {
        Expression::Field(Box::new(base), Box::new(Expression::FieldName(name.into())))
    }

    pub fn element(base: Expression, index: Expression) -> Self {
        Expression::Element(Box::new(base), Box::new(index))
    }

    pub fn add(a: Expression, b: Expression) -> Self {
        Expression::Add(Box::new(a), Box::new(b))
    }

    pub fn eq(a: Expression, b: Expression) -> Self {
        Expression::Eq(Box::new(a), Box::new(b))
    }

    pub fn lt(a: Expression, b: Expression) -> Self {
        Expression::Lt(Box::new(a), Box::new(b))
    }

    pub fn le(a: Expression, b: Expression) -> Self {
        Expression::Le(Box::new(a), Box::new(b))
    }

    /// `a > b`, stored as `b < a`
    pub fn gt(a: Expression, b: Expression) -> Self {
        Expression::lt(b, a)
    }

    /// `a >= b`, stored as `b <= a`
    pub fn ge(a: Expression, b: Expression) -> Self {
        Expression::le(b, a)
    }

    pub fn between(a: Expression, low: Expression, high: Expression) -> Self {
        Expression::Between(Box::new(a), Box::new(low), Box::new(high))
    }

    pub fn like(a: Expression, pattern: Expression) -> Self {
        Expression::Like(Box::new(a), Box::new(pattern))
    }

    pub fn in_list(a: Expression, list: Expression) -> Self {
        Expression::In(Box::new(a), Box::new(list))
    }

    pub fn and(operands: Vec<Expression>) -> Self {
        Expression::And(operands)
    }

    pub fn or(operands: Vec<Expression>) -> Self {
        Expression::Or(operands)
    }

    pub fn not(operand: Expression) -> Self {
        Expression::Not(Box::new(operand))
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.into().to_lowercase(),
            args,
        }
    }

    /// Direct children in evaluation order
    pub fn children(&self) -> Vec<&Expression> {
        use Expression::*;
        match self {
            Constant(_) | Missing | Identifier(_) | FieldName(_) | Subquery(_)
            | NamedParameter(_) | PositionalParameter(_) => Vec::new(),
            Field(a, b) | Element(a, b) | Add(a, b) | Sub(a, b) | Mult(a, b) | Div(a, b)
            | Mod(a, b) | Concat(a, b) | Eq(a, b) | Lt(a, b) | Le(a, b) | Like(a, b)
            | In(a, b) | Within(a, b) => vec![a.as_ref(), b.as_ref()],
            Neg(a) | IsNull(a) | IsNotNull(a) | IsMissing(a) | IsNotMissing(a) | IsValued(a)
            | IsNotValued(a) | Exists(a) | Not(a) => vec![a.as_ref()],
            Between(a, b, c) => vec![a.as_ref(), b.as_ref(), c.as_ref()],
            Slice(a, start, end) => {
                let mut out = vec![a.as_ref()];
                out.extend(start.as_deref());
                out.extend(end.as_deref());
                out
            }
            ArrayConstruct(items) | And(items) | Or(items) => items.iter().collect(),
            Function { args, .. } => args.iter().collect(),
            ObjectConstruct(pairs) => pairs.iter().map(|(_, v)| v).collect(),
            Any { binding, satisfies } | Every { binding, satisfies } => {
                vec![binding.expr.as_ref(), satisfies.as_ref()]
            }
            Array {
                mapping,
                binding,
                when,
            }
            | First {
                mapping,
                binding,
                when,
            } => {
                let mut out = vec![binding.expr.as_ref(), mapping.as_ref()];
                out.extend(when.as_deref());
                out
            }
            SearchedCase { whens, otherwise } => {
                let mut out: Vec<&Expression> =
                    whens.iter().flat_map(|w| [&w.when, &w.then]).collect();
                out.extend(otherwise.as_deref());
                out
            }
            SimpleCase {
                search,
                whens,
                otherwise,
            } => {
                let mut out = vec![search.as_ref()];
                out.extend(whens.iter().flat_map(|w| [&w.when, &w.then]));
                out.extend(otherwise.as_deref());
                out
            }
        }
    }

    /// True when the expression does not read the current document.
    ///
    /// Parameters are static: their values are fixed for the whole query.
    pub fn is_static(&self) -> bool {
        match self {
            Expression::Identifier(_)
            | Expression::Subquery(_)
            | Expression::Any { .. }
            | Expression::Every { .. }
            | Expression::Array { .. }
            | Expression::First { .. } => false,
            other => other.children().into_iter().all(Expression::is_static),
        }
    }

    /// Compile-time value of the expression, if it has one.
    pub fn value(&self) -> Option<Value> {
        match self {
            Expression::Constant(v) => Some(v.clone()),
            Expression::Missing
            | Expression::FieldName(_)
            | Expression::NamedParameter(_)
            | Expression::PositionalParameter(_) => None,
            other => {
                if !other.is_static() {
                    return None;
                }
                if !other.children().into_iter().all(|c| c.value().is_some()) {
                    return None;
                }
                other
                    .evaluate(&Value::Null, &Bindings::default())
                    .ok()
                    .flatten()
            }
        }
    }

    /// Splits a conjunction into its operands
    pub fn conjuncts(&self) -> Vec<&Expression> {
        match self {
            Expression::And(operands) => operands.iter().flat_map(|o| o.conjuncts()).collect(),
            other => vec![other],
        }
    }
}
