//! Tokenizer for expression text

use serde_json::{Number, Value};

use super::errors::{ExprError, ExprResult};

/// Reserved words; never valid as bare identifiers
const KEYWORDS: &[&str] = &[
    "AND", "ANY", "ARRAY", "BETWEEN", "CASE", "ELSE", "END", "EVERY", "EXISTS", "FALSE",
    "FIRST", "FOR", "IN", "IS", "LIKE", "MISSING", "NOT", "NULL", "OR", "SATISFIES", "SELECT",
    "THEN", "TRUE", "VALUED", "WHEN", "WITHIN",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Upper-cased reserved word
    Keyword(&'static str),
    /// Bare identifier
    Ident(String),
    /// Backtick-quoted identifier
    QuotedIdent(String),
    Str(String),
    Number(Value),
    NamedParam(String),
    PositionalParam(usize),
    /// `?`
    NextParam,
    Symbol(&'static str),
    Eof,
}

/// Token plus its byte span in the source
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

const SYMBOLS: &[&str] = &[
    "||", "==", "!=", "<>", "<=", ">=", "(", ")", "[", "]", "{", "}", ",", ".", ":", "+", "-",
    "*", "/", "%", "=", "<", ">",
];

pub fn tokenize(src: &str) -> ExprResult<Vec<Spanned>> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = if c == b'`' {
            let (name, next) = read_quoted(src, pos, '`')?;
            pos = next;
            Token::QuotedIdent(name)
        } else if c == b'"' || c == b'\'' {
            let (s, next) = read_quoted(src, pos, c as char)?;
            pos = next;
            Token::Str(s)
        } else if c.is_ascii_digit() {
            let (n, next) = read_number(src, pos)?;
            pos = next;
            Token::Number(n)
        } else if c == b'$' {
            pos += 1;
            let word_end = scan_word(bytes, pos);
            let word = &src[pos..word_end];
            if word.is_empty() {
                return Err(ExprError::syntax(start, "expected parameter name after '$'"));
            }
            pos = word_end;
            match word.parse::<usize>() {
                Ok(0) => return Err(ExprError::syntax(start, "positional parameters start at $1")),
                Ok(n) => Token::PositionalParam(n),
                Err(_) => Token::NamedParam(word.to_string()),
            }
        } else if c == b'?' {
            pos += 1;
            Token::NextParam
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let word_end = scan_word(bytes, pos);
            let word = &src[pos..word_end];
            pos = word_end;
            let upper = word.to_ascii_uppercase();
            match KEYWORDS.iter().find(|k| **k == upper) {
                Some(k) => Token::Keyword(*k),
                None => Token::Ident(word.to_string()),
            }
        } else {
            let rest = &src[pos..];
            match SYMBOLS.iter().find(|s| rest.starts_with(**s)) {
                Some(s) => {
                    pos += s.len();
                    Token::Symbol(*s)
                }
                None => {
                    let ch = rest.chars().next().unwrap_or('?');
                    return Err(ExprError::syntax(start, format!("unexpected character '{}'", ch)));
                }
            }
        };

        out.push(Spanned {
            token,
            start,
            end: pos,
        });
    }

    out.push(Spanned {
        token: Token::Eof,
        start: src.len(),
        end: src.len(),
    });
    Ok(out)
}

fn scan_word(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
        pos += 1;
    }
    pos
}

/// Reads a quoted run starting at `start` (the opening quote).
///
/// A doubled quote stands for itself; backslash escapes follow JSON.
fn read_quoted(src: &str, start: usize, quote: char) -> ExprResult<(String, usize)> {
    let mut out = String::new();
    let mut chars = src[start + 1..].char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        let at = start + 1 + offset;
        if c == quote {
            if let Some(&(_, next)) = chars.peek() {
                if next == quote {
                    out.push(quote);
                    chars.next();
                    continue;
                }
            }
            return Ok((out, at + c.len_utf8()));
        }
        if c == '\\' && quote != '`' {
            let Some((_, esc)) = chars.next() else {
                break;
            };
            match esc {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'u' => {
                    let mut code = String::with_capacity(4);
                    for _ in 0..4 {
                        match chars.next() {
                            Some((_, h)) => code.push(h),
                            None => return Err(ExprError::syntax(at, "truncated \\u escape")),
                        }
                    }
                    let unit = u32::from_str_radix(&code, 16)
                        .map_err(|_| ExprError::syntax(at, "invalid \\u escape"))?;
                    let ch = if (0xD800..0xDC00).contains(&unit) {
                        let low = read_low_surrogate(&mut chars, at)?;
                        char::from_u32(0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00))
                    } else {
                        char::from_u32(unit)
                    };
                    out.push(ch.ok_or_else(|| ExprError::syntax(at, "invalid \\u escape"))?);
                }
                other => out.push(other),
            }
            continue;
        }
        out.push(c);
    }

    Err(ExprError::syntax(start, "unterminated quoted text"))
}

fn read_low_surrogate(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    at: usize,
) -> ExprResult<u32> {
    let mut text = String::with_capacity(6);
    for _ in 0..6 {
        match chars.next() {
            Some((_, c)) => text.push(c),
            None => return Err(ExprError::syntax(at, "truncated surrogate pair")),
        }
    }
    let hex = text
        .strip_prefix("\\u")
        .ok_or_else(|| ExprError::syntax(at, "unpaired surrogate"))?;
    let low = u32::from_str_radix(hex, 16).map_err(|_| ExprError::syntax(at, "invalid surrogate"))?;
    if !(0xDC00..0xE000).contains(&low) {
        return Err(ExprError::syntax(at, "unpaired surrogate"));
    }
    Ok(low)
}

fn read_number(src: &str, start: usize) -> ExprResult<(Value, usize)> {
    let bytes = src.as_bytes();
    let mut pos = start;
    let mut is_float = false;

    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
        is_float = true;
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            is_float = true;
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    let text = &src[start..pos];
    if !is_float {
        if let Ok(i) = text.parse::<i64>() {
            return Ok((Value::Number(i.into()), pos));
        }
    }
    let f: f64 = text
        .parse()
        .map_err(|_| ExprError::syntax(start, format!("invalid number '{}'", text)))?;
    let n = Number::from_f64(f).ok_or_else(|| ExprError::syntax(start, "number out of range"))?;
    Ok((Value::Number(n), pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("x and Y"),
            vec![
                Token::Ident("x".into()),
                Token::Keyword("AND"),
                Token::Ident("Y".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(kinds(r#""a\"b""#)[0], Token::Str("a\"b".into()));
        assert_eq!(kinds("'it''s'")[0], Token::Str("it's".into()));
        assert_eq!(kinds(r#""\u00e9""#)[0], Token::Str("é".into()));
        assert!(tokenize("\"open").is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42")[0], Token::Number(serde_json::json!(42)));
        assert_eq!(kinds("2.5")[0], Token::Number(serde_json::json!(2.5)));
        assert_eq!(kinds("1e3")[0], Token::Number(serde_json::json!(1000.0)));
    }

    #[test]
    fn test_parameters() {
        assert_eq!(kinds("$name")[0], Token::NamedParam("name".into()));
        assert_eq!(kinds("$2")[0], Token::PositionalParam(2));
        assert!(tokenize("$0").is_err());
    }

    #[test]
    fn test_multi_char_symbols() {
        assert_eq!(
            kinds("a <= b || c"),
            vec![
                Token::Ident("a".into()),
                Token::Symbol("<="),
                Token::Ident("b".into()),
                Token::Symbol("||"),
                Token::Ident("c".into()),
                Token::Eof
            ]
        );
    }
}
