#![forbid(unsafe_code)]

//! Watchable ordered sequence.
//!
//! [`List::splice`] is the only way to change the length of a list, and the
//! only source of [`WatchKey::Insert`] / [`WatchKey::Remove`] notifications.
//!
//! # Notification order
//!
//! Within one `splice` call all removals are reported first, from the highest
//! removed index down to the lowest, each carrying the value that sat at that
//! index before the call. Insertions follow from the lowest new index to the
//! highest. Derived views rely on this order: replaying the removals in the
//! order received never shifts an index that is still to be reported.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::value::Value;
use crate::watch::{BindingScope, Subscription, Watch, WatchKey, Watchers};

#[derive(Default)]
struct ListInner {
    items: RefCell<Vec<Value>>,
    watchers: Watchers,
    // Subscriptions this list holds on its own sources (derived views).
    upstream: RefCell<BindingScope>,
}

/// A shared, watchable list.
///
/// Cloning yields another handle to the same list.
#[derive(Clone, Default)]
pub struct List {
    inner: Rc<ListInner>,
}

impl List {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Snapshot of the current items.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    /// Overwrite the item at `index` and notify the index key, then the
    /// wildcard watchers.
    ///
    /// Writing at `index == len` appends through [`splice`](Self::splice)
    /// instead.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        let len = self.len();
        assert!(index <= len, "index {index} out of range for list of length {len}");
        if index == len {
            self.splice(index, 0, [value]);
            return;
        }
        self.inner.items.borrow_mut()[index] = value.clone();
        trace!(index, value = %value, "list set");
        self.inner.watchers.notify_set(&index.to_string(), &value);
    }

    /// Remove `delete_count` items at `start`, insert `items` in their place,
    /// and return the removed items.
    ///
    /// `start` is clamped to the length, `delete_count` to the items available
    /// after `start`.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let inserted: Vec<Value> = items.into_iter().map(Into::into).collect();
        let (start, removed) = {
            let mut current = self.inner.items.borrow_mut();
            let start = start.min(current.len());
            let end = start + delete_count.min(current.len() - start);
            let removed: Vec<Value> = current.splice(start..end, inserted.iter().cloned()).collect();
            (start, removed)
        };
        trace!(
            start,
            removed = removed.len(),
            inserted = inserted.len(),
            "list splice"
        );

        for (offset, value) in removed.iter().enumerate().rev() {
            let index = start + offset;
            self.inner
                .watchers
                .notify(&WatchKey::Remove, &index.to_string(), value);
        }
        for (offset, value) in inserted.iter().enumerate() {
            let index = start + offset;
            self.inner
                .watchers
                .notify(&WatchKey::Insert, &index.to_string(), value);
        }
        removed
    }

    /// Append `items`. Equivalent to `splice(len, 0, items)`.
    pub fn push<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.splice(self.len(), 0, items);
    }

    /// Prepend `items`. Equivalent to `splice(0, 0, items)`.
    pub fn unshift<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.splice(0, 0, items);
    }

    /// Remove and return the item at `index`, if any.
    pub fn remove(&self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        self.splice(index, 1, std::iter::empty::<Value>()).pop()
    }

    /// Number of live watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.len()
    }

    /// Whether both handles point at the same list.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Hand ownership of `scope` to this list. It is released when the last
    /// handle to the list is dropped.
    pub(crate) fn hold_upstream(&self, scope: BindingScope) {
        self.inner.upstream.borrow_mut().absorb(scope);
    }

    pub(crate) fn downgrade(&self) -> WeakList {
        WeakList(Rc::downgrade(&self.inner))
    }
}

/// Non-owning handle used by source callbacks of derived views.
#[derive(Clone)]
pub(crate) struct WeakList(std::rc::Weak<ListInner>);

impl WeakList {
    pub(crate) fn upgrade(&self) -> Option<List> {
        self.0.upgrade().map(|inner| List { inner })
    }
}

impl Watch for List {
    fn watch(
        &self,
        key: impl Into<WatchKey>,
        callback: impl Fn(&str, &Value) + 'static,
    ) -> Subscription {
        self.inner.watchers.add(key.into(), callback)
    }
}

impl<V: Into<Value>> FromIterator<V> for List {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let list = Self::new();
        *list.inner.items.borrow_mut() = iter.into_iter().map(Into::into).collect();
        list
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter()).finish()
    }
}
