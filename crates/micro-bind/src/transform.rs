#![forbid(unsafe_code)]

//! Transforms: named functions callable from binding expressions.
//!
//! An expression with more than one argument calls its first value as a
//! transform: `format 'Hi {n}' n user.name` calls `format` with the context
//! and the three remaining values.
//!
//! The [`Transforms`] table is shared and open: applications register their
//! own helpers next to the built-ins.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::binder::Binder;
use crate::error::{BindError, Declaration};
use crate::node::{Element, Node};
use crate::projection;
use crate::scope::{Scope, ScopeStack};
use crate::value::Value;
use crate::watch::{BindingScope, Subscription};

/// Signature of a transform.
pub type TransformFn = dyn Fn(&TransformContext<'_>, &[Value]) -> Result<Value, BindError>;

/// A shared transform function.
#[derive(Clone)]
pub struct Transform(Rc<TransformFn>);

impl Transform {
    pub fn new(
        f: impl Fn(&TransformContext<'_>, &[Value]) -> Result<Value, BindError> + 'static,
    ) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, ctx: &TransformContext<'_>, args: &[Value]) -> Result<Value, BindError> {
        (self.0)(ctx, args)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform")
    }
}

/// What a transform sees of the binding that calls it.
///
/// Everything a transform binds or holds through the context lives as long
/// as the value it returns: the next evaluation of the same binding releases
/// it.
pub struct TransformContext<'a> {
    element: &'a Element,
    templates: &'a [Node],
    scopes: &'a ScopeStack,
    declaration: &'a Declaration,
    binder: &'a Binder,
    retained: RefCell<BindingScope>,
}

impl<'a> TransformContext<'a> {
    pub(crate) fn new(
        element: &'a Element,
        templates: &'a [Node],
        scopes: &'a ScopeStack,
        declaration: &'a Declaration,
        binder: &'a Binder,
    ) -> Self {
        Self {
            element,
            templates,
            scopes,
            declaration,
            binder,
            retained: RefCell::new(BindingScope::new()),
        }
    }

    /// The element the binding is declared on.
    #[must_use]
    pub fn element(&self) -> &Element {
        self.element
    }

    /// Element children the bound element had before its first render.
    #[must_use]
    pub fn templates(&self) -> &[Node] {
        self.templates
    }

    #[must_use]
    pub fn scopes(&self) -> &ScopeStack {
        self.scopes
    }

    #[must_use]
    pub fn declaration(&self) -> &Declaration {
        self.declaration
    }

    #[must_use]
    pub fn binder(&self) -> &Binder {
        self.binder
    }

    /// Bind `node` against the binding's own scope stack.
    pub fn bind(&self, node: &Node) -> Result<(), BindError> {
        self.bind_with(node, self.scopes)
    }

    /// Bind `node` against `scopes`.
    pub fn bind_with(&self, node: &Node, scopes: &ScopeStack) -> Result<(), BindError> {
        let bound = self.binder.bind_stack(node.clone(), scopes)?;
        self.retained.borrow_mut().absorb(bound);
        Ok(())
    }

    /// Keep `sub` alive as long as the produced value.
    pub fn hold(&self, sub: Subscription) {
        self.retained.borrow_mut().hold(sub);
    }

    /// Keep `state` alive as long as the produced value.
    pub fn retain(&self, state: Rc<dyn Any>) {
        self.retained.borrow_mut().retain(state);
    }

    /// A configuration error pointing at the calling declaration.
    #[must_use]
    pub fn configuration_error(&self, message: impl Into<String>) -> BindError {
        BindError::Configuration {
            message: message.into(),
            declaration: self.declaration.clone(),
        }
    }

    pub(crate) fn into_retained(self) -> BindingScope {
        self.retained.into_inner()
    }
}

impl fmt::Debug for TransformContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformContext")
            .field("declaration", &self.declaration.to_string())
            .field("templates", &self.templates.len())
            .finish_non_exhaustive()
    }
}

thread_local! {
    static GLOBAL_TRANSFORMS: Transforms = Transforms::new();
}

/// Shared name → transform table.
///
/// Cloning yields another handle to the same table, so transforms registered
/// later are visible to every binder using it.
#[derive(Clone)]
pub struct Transforms {
    table: Rc<RefCell<AHashMap<String, Transform>>>,
}

impl Transforms {
    /// A table preloaded with the built-in transforms.
    #[must_use]
    pub fn new() -> Self {
        let transforms = Self::empty();
        register_builtins(&transforms);
        transforms
    }

    /// A table without any transforms.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            table: Rc::new(RefCell::new(AHashMap::new())),
        }
    }

    /// The thread-local default table used by [`Binder::default`].
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_TRANSFORMS.with(Clone::clone)
    }

    /// Register (or replace) `name`.
    pub fn register(
        &self,
        name: impl Into<String>,
        f: impl Fn(&TransformContext<'_>, &[Value]) -> Result<Value, BindError> + 'static,
    ) {
        self.insert(name, Transform::new(f));
    }

    pub fn insert(&self, name: impl Into<String>, transform: Transform) {
        self.table.borrow_mut().insert(name.into(), transform);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Transform> {
        self.table.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.borrow().contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Transforms {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for Transforms {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key).map(Value::Function)
    }
}

impl fmt::Debug for Transforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transforms")
            .field("names", &self.names())
            .finish()
    }
}

/// Argument `index`, `Undefined` if missing.
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn register_builtins(transforms: &Transforms) {
    transforms.register("not", |_, args| Ok(Value::Bool(!arg(args, 0).is_truthy())));
    transforms.register("eq", |_, args| Ok(Value::Bool(arg(args, 0) == arg(args, 1))));
    transforms.register("or", |_, args| {
        Ok(args
            .iter()
            .find(|v| v.is_truthy())
            .or(args.last())
            .cloned()
            .unwrap_or_default())
    });
    transforms.register("and", |_, args| {
        Ok(args
            .iter()
            .find(|v| !v.is_truthy())
            .or(args.last())
            .cloned()
            .unwrap_or_default())
    });
    transforms.register("includes", |_, args| {
        let needle = arg(args, 1);
        let found = match arg(args, 0) {
            Value::List(list) => list.to_vec().contains(&needle),
            Value::String(s) => s.contains(&needle.to_text()),
            Value::Record(record) => record.contains_key(&needle.to_text()),
            _ => false,
        };
        Ok(Value::Bool(found))
    });
    transforms.register("format", |_, args| {
        let template = arg(args, 0).to_text();
        let pairs: Vec<(String, String)> = args
            .get(1..)
            .unwrap_or_default()
            .chunks(2)
            .map(|pair| (pair[0].to_text(), arg(pair, 1).to_text()))
            .collect();
        Ok(Value::from(interpolate(&template, &pairs)))
    });
    projection::register(transforms);
}

/// Single-pass `{name}` interpolation. Unmatched tokens are left as-is.
pub(crate) fn interpolate(template: &str, args: &[(String, String)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            result.push(ch);
            continue;
        }
        let mut token = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            token.push(c);
        }
        match args.iter().find(|(name, _)| *name == token) {
            Some((_, value)) if closed => result.push_str(value),
            _ => {
                result.push('{');
                result.push_str(&token);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}
