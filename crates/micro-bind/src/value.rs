#![forbid(unsafe_code)]

//! Dynamically typed values flowing through bindings.

use std::fmt;

use crate::list::List;
use crate::node::Node;
use crate::record::Record;
use crate::transform::Transform;

/// A value a binding expression can produce or a watchable can hold.
///
/// Primitive variants compare by value. Handle variants (`Record`, `List`,
/// `Node`, `Function`) compare by identity.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Record(Record),
    List(List),
    Node(Node),
    Function(Transform),
}

impl Value {
    /// Whether the value counts as "true" for class toggles and logic
    /// transforms.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Record(_) | Self::List(_) | Self::Node(_) | Self::Function(_) => true,
        }
    }

    /// Whether the value is `Undefined` or `Null`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Render the value as plain text.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Undefined | Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Record(_) => "[record]".to_owned(),
            Self::List(list) => list_text(list, &mut Vec::new()),
            Self::Node(node) => node.text_content(),
            Self::Function(_) => "[transform]".to_owned(),
        }
    }

    /// Look up a single property: record keys, list indices and the list
    /// pseudo-property `length`.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        match self {
            Self::Record(record) => record.get(key),
            Self::List(list) if key == "length" => Self::from(list.len()),
            Self::List(list) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| list.get(i))
                .unwrap_or_default(),
            Self::String(s) if key == "length" => Self::from(s.chars().count()),
            _ => Self::Undefined,
        }
    }

    /// Walk a dotted path. Any miss yields `Undefined`.
    #[must_use]
    pub fn get_path<S: AsRef<str>>(&self, tokens: &[S]) -> Value {
        let mut current = self.clone();
        for token in tokens {
            if current.is_nullish() {
                return Self::Undefined;
            }
            current = current.get(token.as_ref());
        }
        current
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&Transform> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Record(_) => "record",
            Self::List(_) => "list",
            Self::Node(_) => "node",
            Self::Function(_) => "function",
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n == 0.0 {
        "0".to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a.ptr_eq(b),
            (Self::List(a), Self::List(b)) => a.ptr_eq(b),
            (Self::Node(a), Self::Node(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Self::List(list)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Transform> for Value {
    fn from(f: Transform) -> Self {
        Self::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Comma separated item text. A list already being rendered further up
/// renders as empty text.
fn list_text(list: &List, open: &mut Vec<List>) -> String {
    if open.iter().any(|l| l.ptr_eq(list)) {
        return String::new();
    }
    open.push(list.clone());
    let text = list
        .to_vec()
        .iter()
        .map(|item| match item {
            Value::List(inner) => list_text(inner, open),
            other => other.to_text(),
        })
        .collect::<Vec<_>>()
        .join(",");
    open.pop();
    text
}
