//! Recursive-descent parser for expression text
//!
//! Precedence, loosest first: OR, AND, NOT, comparison, `||`, `+ -`,
//! `* / %`, unary minus, navigation postfix, primary.
//!
//! Array and object literals made only of constants fold into a single
//! `Constant`, as does unary minus on a number, so that stringified
//! constants parse back to the same tree.

use serde_json::{Map, Number, Value};

use super::ast::{Binding, Expression, WhenThen};
use super::errors::{ExprError, ExprResult};
use super::lexer::{tokenize, Spanned, Token};

/// Parses expression text into an expression tree
pub fn parse(text: &str) -> ExprResult<Expression> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        src: text,
        tokens,
        pos: 0,
        next_param: 1,
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.error(format!("unexpected trailing input {:?}", other))),
    }
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    next_param: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].start
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::syntax(self.position(), message)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Keyword(k) if *k == kw)
    }

    fn is_symbol(&self, sym: &str) -> bool {
        matches!(self.peek(), Token::Symbol(s) if *s == sym)
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_symbol(&mut self, sym: &str) -> bool {
        if self.is_symbol(sym) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> ExprResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", kw)))
        }
    }

    fn expect_symbol(&mut self, sym: &str) -> ExprResult<()> {
        if self.eat_symbol(sym) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", sym)))
        }
    }

    fn parse_or(&mut self) -> ExprResult<Expression> {
        let first = self.parse_and()?;
        if !self.is_keyword("OR") {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat_keyword("OR") {
            operands.push(self.parse_and()?);
        }
        Ok(Expression::Or(operands))
    }

    fn parse_and(&mut self) -> ExprResult<Expression> {
        let first = self.parse_not()?;
        if !self.is_keyword("AND") {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat_keyword("AND") {
            operands.push(self.parse_not()?);
        }
        Ok(Expression::And(operands))
    }

    fn parse_not(&mut self) -> ExprResult<Expression> {
        if self.eat_keyword("NOT") {
            return Ok(Expression::not(self.parse_not()?));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ExprResult<Expression> {
        let left = self.parse_concat()?;

        if let Token::Symbol(sym) = self.peek().clone() {
            let op = match sym {
                "=" | "==" | "!=" | "<>" | "<" | "<=" | ">" | ">=" => sym,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_concat()?;
            return Ok(match op {
                "=" | "==" => Expression::eq(left, right),
                "!=" | "<>" => Expression::not(Expression::eq(left, right)),
                "<" => Expression::lt(left, right),
                "<=" => Expression::le(left, right),
                ">" => Expression::gt(left, right),
                _ => Expression::ge(left, right),
            });
        }

        let negated = matches!(self.peek(), Token::Keyword("NOT"))
            && matches!(
                self.peek_at(1),
                Token::Keyword("BETWEEN" | "LIKE" | "IN" | "WITHIN")
            );
        if negated {
            self.advance();
        }

        let expr = if self.eat_keyword("BETWEEN") {
            let low = self.parse_concat()?;
            self.expect_keyword("AND")?;
            let high = self.parse_concat()?;
            Expression::between(left, low, high)
        } else if self.eat_keyword("LIKE") {
            Expression::like(left, self.parse_concat()?)
        } else if self.eat_keyword("IN") {
            Expression::in_list(left, self.parse_concat()?)
        } else if self.eat_keyword("WITHIN") {
            Expression::Within(Box::new(left), Box::new(self.parse_concat()?))
        } else if self.eat_keyword("IS") {
            let not = self.eat_keyword("NOT");
            let operand = Box::new(left);
            match (self.advance(), not) {
                (Token::Keyword("NULL"), false) => Expression::IsNull(operand),
                (Token::Keyword("NULL"), true) => Expression::IsNotNull(operand),
                (Token::Keyword("MISSING"), false) => Expression::IsMissing(operand),
                (Token::Keyword("MISSING"), true) => Expression::IsNotMissing(operand),
                (Token::Keyword("VALUED"), false) => Expression::IsValued(operand),
                (Token::Keyword("VALUED"), true) => Expression::IsNotValued(operand),
                _ => return Err(self.error("expected NULL, MISSING or VALUED after IS")),
            }
        } else {
            return Ok(left);
        };

        Ok(if negated { Expression::not(expr) } else { expr })
    }

    fn parse_concat(&mut self) -> ExprResult<Expression> {
        let mut left = self.parse_additive()?;
        while self.eat_symbol("||") {
            let right = self.parse_additive()?;
            left = Expression::Concat(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> ExprResult<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            if self.eat_symbol("+") {
                left = Expression::Add(Box::new(left), Box::new(self.parse_multiplicative()?));
            } else if self.eat_symbol("-") {
                left = Expression::Sub(Box::new(left), Box::new(self.parse_multiplicative()?));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_multiplicative(&mut self) -> ExprResult<Expression> {
        let mut left = self.parse_unary()?;
        loop {
            if self.eat_symbol("*") {
                left = Expression::Mult(Box::new(left), Box::new(self.parse_unary()?));
            } else if self.eat_symbol("/") {
                left = Expression::Div(Box::new(left), Box::new(self.parse_unary()?));
            } else if self.eat_symbol("%") {
                left = Expression::Mod(Box::new(left), Box::new(self.parse_unary()?));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary(&mut self) -> ExprResult<Expression> {
        if self.eat_symbol("-") {
            let operand = self.parse_unary()?;
            return Ok(match operand {
                Expression::Constant(Value::Number(n)) => Expression::Constant(negate(&n)),
                other => Expression::Neg(Box::new(other)),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ExprResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_symbol(".") {
                if self.eat_symbol("[") {
                    let name = self.parse_or()?;
                    self.expect_symbol("]")?;
                    expr = Expression::Field(Box::new(expr), Box::new(name));
                } else {
                    let name = self.parse_name()?;
                    expr = Expression::field(expr, name);
                }
            } else if self.eat_symbol("[") {
                let start = if self.is_symbol(":") {
                    None
                } else {
                    Some(self.parse_or()?)
                };
                if self.eat_symbol(":") {
                    let end = if self.is_symbol("]") {
                        None
                    } else {
                        Some(Box::new(self.parse_or()?))
                    };
                    self.expect_symbol("]")?;
                    expr = Expression::Slice(Box::new(expr), start.map(Box::new), end);
                } else {
                    self.expect_symbol("]")?;
                    let index = start.ok_or_else(|| self.error("expected index"))?;
                    expr = Expression::element(expr, index);
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_name(&mut self) -> ExprResult<String> {
        match self.advance() {
            Token::Ident(name) | Token::QuotedIdent(name) => Ok(name),
            _ => Err(self.error("expected identifier")),
        }
    }

    fn parse_primary(&mut self) -> ExprResult<Expression> {
        let start = self.position();
        match self.advance() {
            Token::Number(n) => Ok(Expression::Constant(n)),
            Token::Str(s) => Ok(Expression::Constant(Value::String(s))),
            Token::Keyword("TRUE") => Ok(Expression::Constant(Value::Bool(true))),
            Token::Keyword("FALSE") => Ok(Expression::Constant(Value::Bool(false))),
            Token::Keyword("NULL") => Ok(Expression::Constant(Value::Null)),
            Token::Keyword("MISSING") => Ok(Expression::Missing),
            Token::NamedParam(name) => Ok(Expression::NamedParameter(name)),
            Token::PositionalParam(n) => Ok(Expression::PositionalParameter(n)),
            Token::NextParam => {
                let n = self.next_param;
                self.next_param += 1;
                Ok(Expression::PositionalParameter(n))
            }
            Token::QuotedIdent(name) => Ok(Expression::Identifier(name)),
            Token::Ident(name) => {
                if self.eat_symbol("(") {
                    let args = self.parse_list(")")?;
                    Ok(Expression::function(name, args))
                } else {
                    Ok(Expression::Identifier(name))
                }
            }
            Token::Symbol("(") => {
                if self.is_keyword("SELECT") {
                    return self.parse_subquery(start);
                }
                let inner = self.parse_or()?;
                self.expect_symbol(")")?;
                Ok(inner)
            }
            Token::Symbol("[") => {
                let items = self.parse_list("]")?;
                Ok(fold_array(items))
            }
            Token::Symbol("{") => self.parse_object(),
            Token::Keyword("CASE") => self.parse_case(),
            Token::Keyword("EXISTS") => Ok(Expression::Exists(Box::new(self.parse_postfix()?))),
            Token::Keyword(kw @ ("ANY" | "EVERY")) => {
                let binding = self.parse_binding()?;
                self.expect_keyword("SATISFIES")?;
                let satisfies = Box::new(self.parse_or()?);
                self.expect_keyword("END")?;
                Ok(if kw == "ANY" {
                    Expression::Any { binding, satisfies }
                } else {
                    Expression::Every { binding, satisfies }
                })
            }
            Token::Keyword(kw @ ("ARRAY" | "FIRST")) => {
                let mapping = Box::new(self.parse_or()?);
                self.expect_keyword("FOR")?;
                let binding = self.parse_binding()?;
                let when = if self.eat_keyword("WHEN") {
                    Some(Box::new(self.parse_or()?))
                } else {
                    None
                };
                self.expect_keyword("END")?;
                Ok(if kw == "ARRAY" {
                    Expression::Array { mapping, binding, when }
                } else {
                    Expression::First { mapping, binding, when }
                })
            }
            other => Err(ExprError::syntax(start, format!("unexpected token {:?}", other))),
        }
    }

    fn parse_list(&mut self, close: &str) -> ExprResult<Vec<Expression>> {
        let mut items = Vec::new();
        if self.eat_symbol(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            if self.eat_symbol(close) {
                return Ok(items);
            }
            self.expect_symbol(",")?;
        }
    }

    fn parse_object(&mut self) -> ExprResult<Expression> {
        let mut pairs = Vec::new();
        if !self.eat_symbol("}") {
            loop {
                let key = match self.advance() {
                    Token::Str(s) | Token::Ident(s) | Token::QuotedIdent(s) => s,
                    _ => return Err(self.error("expected object key")),
                };
                self.expect_symbol(":")?;
                pairs.push((key, self.parse_or()?));
                if self.eat_symbol("}") {
                    break;
                }
                self.expect_symbol(",")?;
            }
        }
        Ok(fold_object(pairs))
    }

    fn parse_binding(&mut self) -> ExprResult<Binding> {
        let variable = self.parse_name()?;
        self.expect_keyword("IN")?;
        let expr = self.parse_or()?;
        Ok(Binding::new(variable, expr))
    }

    fn parse_case(&mut self) -> ExprResult<Expression> {
        let search = if self.is_keyword("WHEN") {
            None
        } else {
            Some(Box::new(self.parse_or()?))
        };

        let mut whens = Vec::new();
        while self.eat_keyword("WHEN") {
            let when = self.parse_or()?;
            self.expect_keyword("THEN")?;
            let then = self.parse_or()?;
            whens.push(WhenThen { when, then });
        }
        if whens.is_empty() {
            return Err(self.error("CASE requires at least one WHEN"));
        }

        let otherwise = if self.eat_keyword("ELSE") {
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };
        self.expect_keyword("END")?;

        Ok(match search {
            Some(search) => Expression::SimpleCase {
                search,
                whens,
                otherwise,
            },
            None => Expression::SearchedCase { whens, otherwise },
        })
    }

    /// Captures `( SELECT ... )` verbatim; `start` is the opening parenthesis
    fn parse_subquery(&mut self, start: usize) -> ExprResult<Expression> {
        let body_start = self.position();
        let mut depth = 1usize;
        loop {
            let token = self.peek().clone();
            match token {
                Token::Eof => return Err(ExprError::syntax(start, "unterminated subquery")),
                Token::Symbol("(") => depth += 1,
                Token::Symbol(")") => {
                    depth -= 1;
                    if depth == 0 {
                        let body_end = self.position();
                        self.advance();
                        let text = self.src[body_start..body_end].trim().to_string();
                        return Ok(Expression::Subquery(text));
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }
}

fn negate(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        if let Some(neg) = i.checked_neg() {
            return Value::Number(neg.into());
        }
    }
    n.as_f64()
        .and_then(|f| Number::from_f64(-f))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn fold_array(items: Vec<Expression>) -> Expression {
    if items.iter().all(|e| matches!(e, Expression::Constant(_))) {
        let values = items
            .into_iter()
            .filter_map(|e| match e {
                Expression::Constant(v) => Some(v),
                _ => None,
            })
            .collect();
        Expression::Constant(Value::Array(values))
    } else {
        Expression::ArrayConstruct(items)
    }
}

fn fold_object(pairs: Vec<(String, Expression)>) -> Expression {
    if pairs.iter().all(|(_, e)| matches!(e, Expression::Constant(_))) {
        let mut map = Map::new();
        for (k, e) in pairs {
            if let Expression::Constant(v) = e {
                map.insert(k, v);
            }
        }
        Expression::Constant(Value::Object(map))
    } else {
        Expression::ObjectConstruct(pairs)
    }
}
