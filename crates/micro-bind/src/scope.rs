#![forbid(unsafe_code)]

//! Scope stack used to resolve the root of a reference.
//!
//! A stack is an ordered list of [`Scope`]s. Resolution takes the first
//! scope that contains the root key. Bound data comes first, nested item
//! scopes are prepended in front of it, and the transform table sits at the
//! bottom as the final fallback.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::record::Record;
use crate::value::Value;
use crate::watch::{Subscription, Watch};

/// A key-value source a reference can resolve against.
pub trait Scope {
    /// Value under `key`, or `None` if this scope does not have it.
    fn lookup(&self, key: &str) -> Option<Value>;

    /// Watch `key` for changes, if the scope supports watching.
    fn subscribe(
        &self,
        _key: &str,
        _callback: Box<dyn Fn(&str, &Value)>,
    ) -> Option<Subscription> {
        None
    }
}

impl Scope for Record {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.contains_key(key).then(|| self.get(key))
    }

    fn subscribe(&self, key: &str, callback: Box<dyn Fn(&str, &Value)>) -> Option<Subscription> {
        Some(self.watch(key, move |k, v| callback(k, v)))
    }
}

/// Plain, unwatched scope.
impl Scope for AHashMap<String, Value> {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

/// Immutable, cheaply clonable ordered list of scopes.
#[derive(Clone, Default)]
pub struct ScopeStack {
    scopes: Rc<[Rc<dyn Scope>]>,
}

impl ScopeStack {
    #[must_use]
    pub fn new(scopes: impl IntoIterator<Item = Rc<dyn Scope>>) -> Self {
        Self {
            scopes: scopes.into_iter().collect(),
        }
    }

    /// New stack with `scope` searched before every scope of `self`.
    #[must_use]
    pub fn prepend(&self, scope: Rc<dyn Scope>) -> Self {
        Self::new(std::iter::once(scope).chain(self.scopes.iter().cloned()))
    }

    /// New stack with `scope` searched after every scope of `self`.
    #[must_use]
    pub fn append(&self, scope: Rc<dyn Scope>) -> Self {
        Self::new(self.scopes.iter().cloned().chain(std::iter::once(scope)))
    }

    /// Index and value of the first scope containing `key`.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<(usize, Value)> {
        self.scopes
            .iter()
            .enumerate()
            .find_map(|(i, scope)| scope.lookup(key).map(|value| (i, value)))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Rc<dyn Scope>> {
        self.scopes.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl fmt::Debug for ScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeStack")
            .field("depth", &self.scopes.len())
            .finish()
    }
}
