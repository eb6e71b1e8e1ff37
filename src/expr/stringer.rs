//! Canonical expression text
//!
//! Output is fully parenthesised and parses back to the same tree.
//! Identifiers are always backtick-quoted; constants are written as JSON.

use serde_json::Value;

use super::ast::{Binding, Expression, WhenThen};

/// Renders an expression as canonical text
pub fn stringify(expr: &Expression) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &Expression) {
    use Expression::*;
    match expr {
        Constant(v) => write_value(out, v),
        Missing => out.push_str("MISSING"),
        Identifier(name) => write_ident(out, name),
        FieldName(name) => write_ident(out, name),
        Field(base, name) => {
            write_expr(out, base);
            out.push('.');
            match name.as_ref() {
                FieldName(n) => write_ident(out, n),
                other => {
                    out.push('[');
                    write_expr(out, other);
                    out.push(']');
                }
            }
        }
        Element(base, index) => {
            write_expr(out, base);
            out.push('[');
            write_expr(out, index);
            out.push(']');
        }
        Slice(base, start, end) => {
            write_expr(out, base);
            out.push('[');
            if let Some(s) = start {
                write_expr(out, s);
            }
            out.push(':');
            if let Some(e) = end {
                write_expr(out, e);
            }
            out.push(']');
        }
        ArrayConstruct(items) => {
            out.push('[');
            write_list(out, items);
            out.push(']');
        }
        ObjectConstruct(pairs) => {
            out.push('{');
            for (i, (key, value)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, &Value::String(key.clone()));
                out.push_str(": ");
                write_expr(out, value);
            }
            out.push('}');
        }
        Add(a, b) => write_binary(out, a, "+", b),
        Sub(a, b) => write_binary(out, a, "-", b),
        Mult(a, b) => write_binary(out, a, "*", b),
        Div(a, b) => write_binary(out, a, "/", b),
        Mod(a, b) => write_binary(out, a, "%", b),
        Neg(a) => {
            out.push_str("(-");
            write_expr(out, a);
            out.push(')');
        }
        Concat(a, b) => write_binary(out, a, "||", b),
        Eq(a, b) => write_binary(out, a, "=", b),
        Lt(a, b) => write_binary(out, a, "<", b),
        Le(a, b) => write_binary(out, a, "<=", b),
        Between(a, low, high) => {
            out.push('(');
            write_expr(out, a);
            out.push_str(" BETWEEN ");
            write_expr(out, low);
            out.push_str(" AND ");
            write_expr(out, high);
            out.push(')');
        }
        Like(a, b) => write_binary(out, a, "LIKE", b),
        IsNull(a) => write_postfix(out, a, "IS NULL"),
        IsNotNull(a) => write_postfix(out, a, "IS NOT NULL"),
        IsMissing(a) => write_postfix(out, a, "IS MISSING"),
        IsNotMissing(a) => write_postfix(out, a, "IS NOT MISSING"),
        IsValued(a) => write_postfix(out, a, "IS VALUED"),
        IsNotValued(a) => write_postfix(out, a, "IS NOT VALUED"),
        In(a, b) => write_binary(out, a, "IN", b),
        Within(a, b) => write_binary(out, a, "WITHIN", b),
        Exists(a) => {
            out.push_str("(EXISTS ");
            write_expr(out, a);
            out.push(')');
        }
        Any { binding, satisfies } => write_quantifier(out, "ANY", binding, satisfies),
        Every { binding, satisfies } => write_quantifier(out, "EVERY", binding, satisfies),
        Array {
            mapping,
            binding,
            when,
        } => write_mapping(out, "ARRAY", mapping, binding, when.as_deref()),
        First {
            mapping,
            binding,
            when,
        } => write_mapping(out, "FIRST", mapping, binding, when.as_deref()),
        SearchedCase { whens, otherwise } => {
            out.push_str("CASE");
            write_whens(out, whens, otherwise.as_deref());
        }
        SimpleCase {
            search,
            whens,
            otherwise,
        } => {
            out.push_str("CASE ");
            write_expr(out, search);
            write_whens(out, whens, otherwise.as_deref());
        }
        And(operands) => write_chain(out, operands, " AND "),
        Or(operands) => write_chain(out, operands, " OR "),
        Not(a) => {
            out.push_str("(NOT ");
            write_expr(out, a);
            out.push(')');
        }
        Function { name, args } => {
            out.push_str(name);
            out.push('(');
            write_list(out, args);
            out.push(')');
        }
        Subquery(text) => {
            out.push('(');
            out.push_str(text);
            out.push(')');
        }
        NamedParameter(name) => {
            out.push('$');
            out.push_str(name);
        }
        PositionalParameter(n) => {
            out.push('$');
            out.push_str(&n.to_string());
        }
    }
}

fn write_value(out: &mut String, value: &Value) {
    match serde_json::to_string(value) {
        Ok(text) => out.push_str(&text),
        Err(_) => out.push_str("null"),
    }
}

fn write_ident(out: &mut String, name: &str) {
    out.push('`');
    out.push_str(&name.replace('`', "``"));
    out.push('`');
}

fn write_list(out: &mut String, items: &[Expression]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, item);
    }
}

fn write_binary(out: &mut String, a: &Expression, op: &str, b: &Expression) {
    out.push('(');
    write_expr(out, a);
    out.push(' ');
    out.push_str(op);
    out.push(' ');
    write_expr(out, b);
    out.push(')');
}

fn write_postfix(out: &mut String, a: &Expression, op: &str) {
    out.push('(');
    write_expr(out, a);
    out.push(' ');
    out.push_str(op);
    out.push(')');
}

fn write_chain(out: &mut String, operands: &[Expression], sep: &str) {
    out.push('(');
    for (i, op) in operands.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        write_expr(out, op);
    }
    out.push(')');
}

fn write_binding(out: &mut String, binding: &Binding) {
    write_ident(out, &binding.variable);
    out.push_str(" IN ");
    write_expr(out, &binding.expr);
}

fn write_quantifier(out: &mut String, kw: &str, binding: &Binding, satisfies: &Expression) {
    out.push_str(kw);
    out.push(' ');
    write_binding(out, binding);
    out.push_str(" SATISFIES ");
    write_expr(out, satisfies);
    out.push_str(" END");
}

fn write_mapping(
    out: &mut String,
    kw: &str,
    mapping: &Expression,
    binding: &Binding,
    when: Option<&Expression>,
) {
    out.push_str(kw);
    out.push(' ');
    write_expr(out, mapping);
    out.push_str(" FOR ");
    write_binding(out, binding);
    if let Some(when) = when {
        out.push_str(" WHEN ");
        write_expr(out, when);
    }
    out.push_str(" END");
}

fn write_whens(out: &mut String, whens: &[WhenThen], otherwise: Option<&Expression>) {
    for WhenThen { when, then } in whens {
        out.push_str(" WHEN ");
        write_expr(out, when);
        out.push_str(" THEN ");
        write_expr(out, then);
    }
    if let Some(e) = otherwise {
        out.push_str(" ELSE ");
        write_expr(out, e);
    }
    out.push_str(" END");
}
