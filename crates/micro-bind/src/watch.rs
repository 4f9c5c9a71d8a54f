#![forbid(unsafe_code)]

//! Watcher registry shared by [`Record`] and [`List`].
//!
//! # Architecture
//!
//! A watchable keeps its watchers as `(WatchKey, Weak<callback>)` pairs. The
//! strong reference lives in the [`Subscription`] returned by `watch`, so
//! dropping the subscription is all it takes to unregister. Dead entries are
//! pruned lazily on the next registration or notification.
//!
//! # Invariants
//!
//! 1. Watchers for one key fire in registration order.
//! 2. A notification pass never holds a borrow of the registry while a
//!    callback runs. Callbacks may register watchers or mutate the watchable
//!    they were notified by; the nested notification runs to completion before
//!    the outer pass continues.
//! 3. Watchers registered during a pass are not called by that pass.
//! 4. Dropping a [`Subscription`] stops its callback at once, including
//!    later calls of a pass that is already running.
//!
//! [`Record`]: crate::Record
//! [`List`]: crate::List

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::value::Value;

/// Callback invoked with `(key, value)` for every matching change.
pub type WatchFn = dyn Fn(&str, &Value);

/// Key a watcher is registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchKey {
    /// A specific property name (or list index as decimal text).
    Key(String),
    /// Any property write on the watchable.
    Any,
    /// An item spliced into a list. The payload key is the new index.
    Insert,
    /// An item spliced out of a list. The payload key is the old index.
    Remove,
}

impl From<&str> for WatchKey {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for WatchKey {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for WatchKey {
    fn from(index: usize) -> Self {
        Self::Key(index.to_string())
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Any => f.write_str("*"),
            Self::Insert => f.write_str("+"),
            Self::Remove => f.write_str("-"),
        }
    }
}

/// Types that notify watchers about their own mutations.
pub trait Watch {
    /// Register `callback` for changes matching `key`.
    ///
    /// The registration lasts as long as the returned [`Subscription`].
    fn watch(
        &self,
        key: impl Into<WatchKey>,
        callback: impl Fn(&str, &Value) + 'static,
    ) -> Subscription;
}

/// RAII guard for a watcher registration. Dropping it unregisters the watcher.
#[must_use = "dropping a Subscription unregisters the watcher"]
pub struct Subscription {
    _callback: Rc<WatchFn>,
}

impl Subscription {
    /// Unregister now instead of at drop time.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[derive(Default)]
pub(crate) struct Watchers {
    entries: RefCell<Vec<(WatchKey, Weak<WatchFn>)>>,
}

impl Watchers {
    pub(crate) fn add(
        &self,
        key: WatchKey,
        callback: impl Fn(&str, &Value) + 'static,
    ) -> Subscription {
        let callback: Rc<WatchFn> = Rc::new(callback);
        let mut entries = self.entries.borrow_mut();
        entries.retain(|(_, weak)| weak.strong_count() > 0);
        entries.push((key, Rc::downgrade(&callback)));
        Subscription {
            _callback: callback,
        }
    }

    /// Snapshot the callbacks matching `key`, in registration order.
    fn matching(&self, key: &WatchKey) -> Vec<Weak<WatchFn>> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|(_, weak)| weak.strong_count() > 0);
        entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, weak)| Weak::clone(weak))
            .collect()
    }

    /// Notify watchers of `key`, then the wildcard watchers.
    pub(crate) fn notify_set(&self, key: &str, value: &Value) {
        let exact = self.matching(&WatchKey::Key(key.to_owned()));
        let any = self.matching(&WatchKey::Any);
        for callback in exact.iter().chain(&any).filter_map(Weak::upgrade) {
            callback(key, value);
        }
    }

    pub(crate) fn notify(&self, key: &WatchKey, payload_key: &str, value: &Value) {
        for callback in self.matching(key).iter().filter_map(Weak::upgrade) {
            callback(payload_key, value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }
}

/// Collects subscriptions and helper state for a logical owner (a bound
/// subtree, a derived list, a projected fragment).
///
/// When the scope is dropped, everything it holds is released, disconnecting
/// the associated watchers.
///
/// # Invariants
///
/// 1. Held items are released in reverse registration order on drop.
/// 2. After drop, no callbacks from this scope will fire.
/// 3. `clear()` releases everything immediately (reusable scope).
#[derive(Default)]
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
    retained: Vec<Rc<dyn Any>>,
}

impl BindingScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `sub` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Keep arbitrary shared state alive for the lifetime of the scope.
    pub fn retain(&mut self, state: Rc<dyn Any>) {
        self.retained.push(state);
    }

    /// Move everything held by `other` into this scope.
    pub fn absorb(&mut self, mut other: BindingScope) {
        self.subscriptions.append(&mut other.subscriptions);
        self.retained.append(&mut other.retained);
    }

    /// Subscribe to `source` within this scope.
    pub fn watch<W: Watch>(
        &mut self,
        source: &W,
        key: impl Into<WatchKey>,
        callback: impl Fn(&str, &Value) + 'static,
    ) -> &mut Self {
        let sub = source.watch(key, callback);
        self.subscriptions.push(sub);
        self
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.retained.is_empty()
    }

    /// Release everything immediately (scope becomes empty but reusable).
    pub fn clear(&mut self) {
        while self.subscriptions.pop().is_some() {}
        while self.retained.pop().is_some() {}
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("subscription_count", &self.subscriptions.len())
            .field("retained", &self.retained.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn unsubscribe_during_pass_skips_later_watcher() {
        let watchers = Watchers::default();
        let hits = Rc::new(Cell::new(0));
        let later: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let slot = Rc::clone(&later);
        let _first = watchers.add(WatchKey::Any, move |_, _| drop(slot.borrow_mut().take()));
        let h = Rc::clone(&hits);
        *later.borrow_mut() = Some(watchers.add(WatchKey::Any, move |_, _| h.set(h.get() + 1)));

        watchers.notify_set("k", &Value::Null);
        assert_eq!(hits.get(), 0);
        assert_eq!(watchers.len(), 1);
    }

    #[test]
    fn exact_then_any() {
        let watchers = Watchers::default();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = Rc::clone(&order);
        let _any = watchers.add(WatchKey::Any, move |k, _| o.borrow_mut().push(format!("any:{k}")));
        let o = Rc::clone(&order);
        let _foo = watchers.add("foo".into(), move |k, _| o.borrow_mut().push(format!("foo:{k}")));

        watchers.notify_set("foo", &Value::Null);
        assert_eq!(*order.borrow(), vec!["foo:foo", "any:foo"]);
    }

    #[test]
    fn registration_order_preserved() {
        let watchers = Watchers::default();
        let order = Rc::new(RefCell::new(Vec::new()));
        let subs: Vec<_> = (0..4)
            .map(|i| {
                let o = Rc::clone(&order);
                watchers.add(WatchKey::Insert, move |_, _| o.borrow_mut().push(i))
            })
            .collect();

        watchers.notify(&WatchKey::Insert, "0", &Value::Null);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
        drop(subs);
    }

    #[test]
    fn dropped_subscription_stops_firing() {
        let watchers = Watchers::default();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = watchers.add(WatchKey::Any, move |_, _| c.set(c.get() + 1));

        watchers.notify_set("x", &Value::Null);
        sub.unsubscribe();
        watchers.notify_set("x", &Value::Null);

        assert_eq!(count.get(), 1);
        assert_eq!(watchers.len(), 0);
    }

    #[test]
    fn other_keys_ignored() {
        let watchers = Watchers::default();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = watchers.add("a".into(), move |_, _| c.set(c.get() + 1));

        watchers.notify_set("b", &Value::Null);
        watchers.notify(&WatchKey::Remove, "0", &Value::Null);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn scope_drop_releases() {
        let watchers = Watchers::default();
        let count = Rc::new(Cell::new(0));
        {
            let mut scope = BindingScope::new();
            let c = Rc::clone(&count);
            scope.hold(watchers.add(WatchKey::Any, move |_, _| c.set(c.get() + 1)));
            assert_eq!(scope.subscription_count(), 1);
            watchers.notify_set("a", &Value::Null);
        }
        watchers.notify_set("a", &Value::Null);
        assert_eq!(count.get(), 1, "callback should not fire after scope dropped");
    }

    #[test]
    fn scope_clear_is_reusable() {
        let watchers = Watchers::default();
        let mut scope = BindingScope::new();
        scope.hold(watchers.add(WatchKey::Any, |_, _| {}));
        scope.retain(Rc::new(5_u8));
        scope.clear();
        assert!(scope.is_empty());

        scope.hold(watchers.add(WatchKey::Any, |_, _| {}));
        assert_eq!(watchers.len(), 1);
    }

    #[test]
    fn scope_absorb_moves_everything() {
        let watchers = Watchers::default();
        let mut outer = BindingScope::new();
        let mut inner = BindingScope::new();
        inner.hold(watchers.add(WatchKey::Any, |_, _| {}));
        inner.retain(Rc::new(()));
        outer.absorb(inner);
        assert_eq!(outer.subscription_count(), 1);
        assert_eq!(watchers.len(), 1);
    }

    #[test]
    fn scope_debug_format() {
        let watchers = Watchers::default();
        let mut scope = BindingScope::new();
        scope.hold(watchers.add(WatchKey::Any, |_, _| {}));
        scope.hold(watchers.add(WatchKey::Any, |_, _| {}));
        let debug = format!("{scope:?}");
        assert!(debug.contains("subscription_count: 2"));
    }

    #[test]
    fn watch_key_display() {
        assert_eq!(WatchKey::from("foo").to_string(), "foo");
        assert_eq!(WatchKey::from(3_usize).to_string(), "3");
        assert_eq!(WatchKey::Insert.to_string(), "+");
    }
}
