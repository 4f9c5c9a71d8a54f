#![forbid(unsafe_code)]

//! Binding errors.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Raised |
//! |---------|-------|--------|
//! | `Syntax` | Empty expression | bind time |
//! | `Reference` | Root name in no scope | bind time |
//! | `Type` | First of several values is not a transform | every evaluation |
//! | `Configuration` | Transform misconfigured (e.g. `switch` template count) | every evaluation |
//! | `AlreadyBound` | Binding an element twice | immediately |
//!
//! None of these are recovered inside the engine. Errors from the initial
//! bind propagate to the caller; errors from a re-evaluation triggered by a
//! watcher go to the [`Binder`](crate::Binder) error handler.

use std::fmt;

use crate::node::Element;

/// Identifies one declared binding in error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Opening tag of the element, e.g. `<li class="item">`.
    pub element: String,
    pub target: String,
    pub expression: String,
}

impl Declaration {
    #[must_use]
    pub fn new(element: &Element, target: &str, expression: &str) -> Self {
        Self {
            element: element.describe(),
            target: target.to_owned(),
            expression: expression.to_owned(),
        }
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}=\"{}\"", self.element, self.target, self.expression)
    }
}

/// Errors from binding and transform evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    #[error("syntax error: empty expression in {declaration}")]
    Syntax { declaration: Declaration },

    #[error("reference error: '{name}' is not defined in {declaration}")]
    Reference {
        name: String,
        declaration: Declaration,
    },

    #[error("type error: '{name}' is a {kind}, not a transform, in {declaration}")]
    Type {
        name: String,
        kind: &'static str,
        declaration: Declaration,
    },

    #[error("configuration error: {message} in {declaration}")]
    Configuration {
        message: String,
        declaration: Declaration,
    },

    #[error("already bound: {element}")]
    AlreadyBound { element: String },
}

impl BindError {
    /// The declaration the error points at, if any.
    #[must_use]
    pub fn declaration(&self) -> Option<&Declaration> {
        match self {
            Self::Syntax { declaration }
            | Self::Reference { declaration, .. }
            | Self::Type { declaration, .. }
            | Self::Configuration { declaration, .. } => Some(declaration),
            Self::AlreadyBound { .. } => None,
        }
    }
}
