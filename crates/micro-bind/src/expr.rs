#![forbid(unsafe_code)]

//! Binding expression parser.
//!
//! An expression is a whitespace separated list of arguments. Each argument
//! is either a literal or a dotted reference:
//!
//! | Token | Argument |
//! |-------|----------|
//! | `true`, `false`, `null`, `undefined` | keyword literal |
//! | `'any text'` | string literal, quotes stripped, no escapes |
//! | `42`, `-1.5`, `+3e2` | number literal (sign, then a digit) |
//! | anything else | reference, split on `.` |
//!
//! Whitespace inside single quotes does not split. The parser never fails;
//! an empty argument list is rejected by the binder.

use crate::value::Value;

/// A dotted reference such as `item.title`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Full source text.
    pub text: String,
    /// `text` split on `.`. Never empty.
    pub tokens: Vec<String>,
}

impl Reference {
    /// The first token, looked up in the scope stack.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.tokens[0]
    }

    /// Tokens after the root.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.tokens[1..]
    }
}

/// One parsed argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Literal(Value),
    Reference(Reference),
}

/// Parse `expression` into its arguments.
///
/// ```
/// use micro_bind::expr::{parse, Arg};
/// use micro_bind::Value;
///
/// let args = parse("format 'Hello {name}' name user.name");
/// assert_eq!(args.len(), 4);
/// assert_eq!(args[1], Arg::Literal(Value::from("Hello {name}")));
/// ```
#[must_use]
pub fn parse(expression: &str) -> Vec<Arg> {
    tokenize(expression).into_iter().map(parse_token).collect()
}

fn tokenize(expression: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    let mut quoted = false;
    for (i, ch) in expression.char_indices() {
        if ch == '\'' {
            quoted = !quoted;
            start.get_or_insert(i);
        } else if ch.is_whitespace() && !quoted {
            if let Some(s) = start.take() {
                tokens.push(&expression[s..i]);
            }
        } else {
            start.get_or_insert(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&expression[s..]);
    }
    tokens
}

fn parse_token(token: &str) -> Arg {
    match token {
        "true" => return Arg::Literal(Value::Bool(true)),
        "false" => return Arg::Literal(Value::Bool(false)),
        "null" => return Arg::Literal(Value::Null),
        "undefined" => return Arg::Literal(Value::Undefined),
        _ => {}
    }
    if let Some(rest) = token.strip_prefix('\'') {
        let inner = rest.strip_suffix('\'').unwrap_or(rest);
        return Arg::Literal(Value::from(inner));
    }
    if starts_number(token) {
        return Arg::Literal(Value::Number(parse_float_prefix(token)));
    }
    Arg::Reference(Reference {
        text: token.to_owned(),
        tokens: token.split('.').map(str::to_owned).collect(),
    })
}

fn starts_number(token: &str) -> bool {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    digits.starts_with(|c: char| c.is_ascii_digit())
}

/// Parse the longest prefix of `token` that forms a float, like a lenient
/// `parseFloat`.
fn parse_float_prefix(token: &str) -> f64 {
    let bytes = token.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            while bytes.get(exp).is_some_and(u8::is_ascii_digit) {
                exp += 1;
            }
            end = exp;
        }
    }
    token[..end].parse().unwrap_or(f64::NAN)
}
