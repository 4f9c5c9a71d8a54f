#![forbid(unsafe_code)]

//! Watchable mapping of string keys to values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::trace;

use crate::value::Value;
use crate::watch::{Subscription, Watch, WatchKey, Watchers};

#[derive(Default)]
struct RecordInner {
    values: RefCell<AHashMap<String, Value>>,
    watchers: Watchers,
}

/// A shared, watchable record.
///
/// Cloning yields another handle to the same record. Every [`set`](Self::set)
/// notifies the watchers of that key, then the [`WatchKey::Any`] watchers,
/// before it returns.
///
/// ```
/// use micro_bind::{Record, Value, Watch};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let record = Record::from_iter([("foo", Value::Null)]);
/// let seen = Rc::new(Cell::new(0.0));
/// let s = Rc::clone(&seen);
/// let _sub = record.watch("foo", move |_, v| s.set(v.as_number().unwrap_or_default()));
///
/// record.set("foo", 42);
/// assert_eq!(seen.get(), 42.0);
/// ```
#[derive(Clone, Default)]
pub struct Record {
    inner: Rc<RecordInner>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, `Undefined` if absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.inner
            .values
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.values.borrow().contains_key(key)
    }

    /// Store `value` under `key` and notify watchers.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.inner
            .values
            .borrow_mut()
            .insert(key.clone(), value.clone());
        trace!(key = %key, value = %value, "record set");
        self.inner.watchers.notify_set(&key, &value);
    }

    /// All keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.values.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.values.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.values.borrow().is_empty()
    }

    /// Number of live watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.len()
    }

    /// Whether both handles point at the same record.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Watch for Record {
    fn watch(
        &self,
        key: impl Into<WatchKey>,
        callback: impl Fn(&str, &Value) + 'static,
    ) -> Subscription {
        self.inner.watchers.add(key.into(), callback)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Rc::new(RecordInner {
                values: RefCell::new(values),
                watchers: Watchers::default(),
            }),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.inner.values.borrow();
        let mut entries: Vec<_> = values.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        f.debug_map().entries(entries).finish()
    }
}
