#![forbid(unsafe_code)]

//! Live derived lists.
//!
//! [`filter`] and [`map`] return a new [`List`] that follows its source
//! incrementally, driven purely by the source's notifications. The derived
//! list owns its source subscriptions and a handle to the source itself, so a
//! chain built from temporaries keeps working. Once the last handle to the
//! derived list is dropped, the source stops feeding it. Source callbacks only
//! hold weak references to the derived list.
//!
//! Derived lists must be treated as read-only by callers. Writing to one
//! directly desynchronizes it from its source.
//!
//! # Invariants
//!
//! 1. The filter cache has exactly one entry per source item.
//! 2. A filtered list has exactly as many items as the cache has `true`
//!    entries, in source order.
//! 3. `map(s, f)` equals `s.iter().map(f)` after every notification.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::list::List;
use crate::value::Value;
use crate::watch::{BindingScope, Watch, WatchKey};

fn parse_index(key: &str) -> Option<usize> {
    key.parse().ok()
}

/// Number of passing items before source index `index`.
fn map_index(cache: &[bool], index: usize) -> usize {
    cache[..index.min(cache.len())]
        .iter()
        .filter(|pass| **pass)
        .count()
}

/// Keep only the items of `source` for which `predicate(item, index, source)`
/// holds, live.
///
/// ```
/// use micro_bind::{List, Value, filter};
///
/// let source = List::from_iter(["a1", "b1", "a2", "b2"]);
/// let only_a = filter(&source, |v, _, _| v.to_text().starts_with('a'));
/// source.set(1, "ax");
/// assert_eq!(only_a.to_vec(), vec![Value::from("a1"), Value::from("ax"), Value::from("a2")]);
/// ```
pub fn filter<F>(source: &List, predicate: F) -> List
where
    F: Fn(&Value, usize, &List) -> bool + 'static,
{
    let predicate = Rc::new(predicate);
    let items = source.to_vec();
    let cache: Vec<bool> = items
        .iter()
        .enumerate()
        .map(|(i, item)| predicate(item, i, source))
        .collect();
    let derived: List = items
        .into_iter()
        .zip(&cache)
        .filter(|(_, pass)| **pass)
        .map(|(item, _)| item)
        .collect();
    let cache = Rc::new(RefCell::new(cache));
    let mut upstream = BindingScope::new();

    {
        let target = derived.downgrade();
        let cache = Rc::clone(&cache);
        let predicate = Rc::clone(&predicate);
        let src = source.downgrade();
        upstream.watch(source, WatchKey::Any, move |key, value| {
            let (Some(index), Some(target), Some(src)) =
                (parse_index(key), target.upgrade(), src.upgrade())
            else {
                return;
            };
            let pass = predicate(value, index, &src);
            let (was, at) = {
                let mut cache = cache.borrow_mut();
                let Some(slot) = cache.get_mut(index) else {
                    return;
                };
                let was = std::mem::replace(slot, pass);
                (was, map_index(&cache, index))
            };
            trace!(index, was, pass, at, "filter update");
            match (was, pass) {
                (true, true) => target.set(at, value.clone()),
                (false, true) => {
                    target.splice(at, 0, [value.clone()]);
                }
                (true, false) => {
                    target.splice(at, 1, std::iter::empty::<Value>());
                }
                (false, false) => {}
            }
        });
    }
    {
        let target = derived.downgrade();
        let cache = Rc::clone(&cache);
        let predicate = Rc::clone(&predicate);
        let src = source.downgrade();
        upstream.watch(source, WatchKey::Insert, move |key, value| {
            let (Some(index), Some(target), Some(src)) =
                (parse_index(key), target.upgrade(), src.upgrade())
            else {
                return;
            };
            let pass = predicate(value, index, &src);
            let at = {
                let mut cache = cache.borrow_mut();
                let index = index.min(cache.len());
                cache.insert(index, pass);
                map_index(&cache, index)
            };
            if pass {
                target.splice(at, 0, [value.clone()]);
            }
        });
    }
    {
        let target = derived.downgrade();
        let cache = Rc::clone(&cache);
        upstream.watch(source, WatchKey::Remove, move |key, _| {
            let (Some(index), Some(target)) = (parse_index(key), target.upgrade()) else {
                return;
            };
            let (was, at) = {
                let mut cache = cache.borrow_mut();
                if index >= cache.len() {
                    return;
                }
                let was = cache.remove(index);
                (was, map_index(&cache, index))
            };
            if was {
                target.splice(at, 1, std::iter::empty::<Value>());
            }
        });
    }

    upstream.retain(Rc::new(source.clone()));
    derived.hold_upstream(upstream);
    derived
}

/// Transform every item of `source` with `transform`, live.
///
/// ```
/// use micro_bind::{List, Value, map};
///
/// let source = List::from_iter([1, 2]);
/// let doubled = map(&source, |v| Value::from(v.as_number().unwrap_or_default() * 2.0));
/// source.push([5]);
/// assert_eq!(doubled.to_vec(), vec![Value::from(2), Value::from(4), Value::from(10)]);
/// ```
pub fn map<F>(source: &List, transform: F) -> List
where
    F: Fn(&Value) -> Value + 'static,
{
    let transform = Rc::new(transform);
    let derived: List = source.to_vec().iter().map(|v| transform(v)).collect();
    let mut upstream = BindingScope::new();

    {
        let target = derived.downgrade();
        let transform = Rc::clone(&transform);
        upstream.watch(source, WatchKey::Any, move |key, value| {
            if let (Some(index), Some(target)) = (parse_index(key), target.upgrade()) {
                if index < target.len() {
                    target.set(index, transform(value));
                }
            }
        });
    }
    {
        let target = derived.downgrade();
        let transform = Rc::clone(&transform);
        upstream.watch(source, WatchKey::Insert, move |key, value| {
            if let (Some(index), Some(target)) = (parse_index(key), target.upgrade()) {
                target.splice(index, 0, [transform(value)]);
            }
        });
    }
    {
        let target = derived.downgrade();
        upstream.watch(source, WatchKey::Remove, move |key, _| {
            if let (Some(index), Some(target)) = (parse_index(key), target.upgrade()) {
                target.splice(index, 1, std::iter::empty::<Value>());
            }
        });
    }

    upstream.retain(Rc::new(source.clone()));
    derived.hold_upstream(upstream);
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn texts(list: &List) -> Vec<String> {
        list.to_vec().iter().map(Value::to_text).collect()
    }

    fn starts_with_a(v: &Value, _: usize, _: &List) -> bool {
        v.to_text().starts_with('a')
    }

    #[test]
    fn filter_initial_and_set() {
        let source = List::from_iter(["a1", "b1", "a2", "b2"]);
        let filtered = filter(&source, starts_with_a);
        assert_eq!(texts(&filtered), vec!["a1", "a2"]);

        source.set(1, "ax");
        assert_eq!(texts(&filtered), vec!["a1", "ax", "a2"]);
    }

    #[test]
    fn filter_set_cases() {
        let source = List::from_iter(["a1", "b1", "a2"]);
        let filtered = filter(&source, starts_with_a);

        // true -> true
        source.set(0, "a0");
        assert_eq!(texts(&filtered), vec!["a0", "a2"]);
        // true -> false
        source.set(2, "b2");
        assert_eq!(texts(&filtered), vec!["a0"]);
        // false -> false
        source.set(1, "b9");
        assert_eq!(texts(&filtered), vec!["a0"]);
        // false -> true
        source.set(2, "a3");
        assert_eq!(texts(&filtered), vec!["a0", "a3"]);
    }

    #[test]
    fn filter_splice() {
        let source = List::from_iter(["a1", "b1", "a2"]);
        let filtered = filter(&source, starts_with_a);

        source.splice(1, 1, ["a5", "b5", "a6"]);
        assert_eq!(texts(&filtered), vec!["a1", "a5", "a6", "a2"]);

        source.splice(0, 4, Vec::<Value>::new());
        assert_eq!(texts(&filtered), vec!["a2"]);

        source.unshift(["a0"]);
        assert_eq!(texts(&filtered), vec!["a0", "a2"]);
    }

    #[test]
    fn filter_index_argument() {
        let source = List::from_iter(["x", "y", "z"]);
        let even = filter(&source, |_, i, _| i % 2 == 0);
        assert_eq!(texts(&even), vec!["x", "z"]);
    }

    #[test]
    fn map_follows_source() {
        let source = List::from_iter(["a", "b"]);
        let upper = map(&source, |v| Value::from(v.to_text().to_uppercase()));
        assert_eq!(texts(&upper), vec!["A", "B"]);

        source.set(1, "q");
        source.push(["c"]);
        source.splice(0, 1, Vec::<Value>::new());
        assert_eq!(texts(&upper), vec!["Q", "C"]);
    }

    #[test]
    fn chained_views_resolve_eagerly() {
        let source = List::from_iter(["a1", "b1"]);
        let upper = map(&source, |v| Value::from(v.to_text().to_uppercase()));
        let only_a = filter(&upper, |v, _, _| v.to_text().starts_with('A'));

        source.push(["a2"]);
        assert_eq!(texts(&only_a), vec!["A1", "A2"]);
    }

    #[test]
    fn chain_of_temporaries_stays_live() {
        let source = List::from_iter(["a1", "b1"]);
        let only_a = filter(
            &map(&source, |v| Value::from(v.to_text().to_uppercase())),
            |v, _, _| v.to_text().starts_with('A'),
        );

        source.push(["a2"]);
        source.set(1, "a3");
        assert_eq!(texts(&only_a), vec!["A1", "A3", "A2"]);

        drop(only_a);
        assert_eq!(source.watcher_count(), 0);
    }

    #[test]
    fn dropping_derived_detaches_source() {
        let source = List::from_iter(["a"]);
        let filtered = filter(&source, starts_with_a);
        assert_eq!(source.watcher_count(), 3);

        drop(filtered);
        assert_eq!(source.watcher_count(), 0);
        source.push(["a2"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(usize, u8),
        Splice(usize, usize, Vec<u8>),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..12, any::<u8>()).prop_map(|(i, v)| Op::Set(i, v)),
            (0usize..12, 0usize..4, prop::collection::vec(any::<u8>(), 0..4))
                .prop_map(|(s, d, items)| Op::Splice(s, d, items)),
        ]
    }

    fn apply(source: &List, op: &Op) {
        match op {
            Op::Set(i, v) => {
                if *i < source.len() {
                    source.set(*i, i32::from(*v));
                }
            }
            Op::Splice(s, d, items) => {
                source.splice(*s, *d, items.iter().map(|v| i32::from(*v)));
            }
        }
    }

    fn is_even(v: &Value) -> bool {
        v.as_number().is_some_and(|n| n % 2.0 == 0.0)
    }

    proptest! {
        #[test]
        fn filter_tracks_predicate(
            initial in prop::collection::vec(any::<u8>(), 0..8),
            ops in prop::collection::vec(op(), 0..24),
        ) {
            let source: List = initial.iter().map(|v| i32::from(*v)).collect();
            let evens = filter(&source, |v, _, _| is_even(v));
            for op in &ops {
                apply(&source, op);
                let expected: Vec<Value> = source.to_vec().into_iter().filter(is_even).collect();
                prop_assert_eq!(evens.to_vec(), expected);
            }
        }

        #[test]
        fn map_tracks_source(
            initial in prop::collection::vec(any::<u8>(), 0..8),
            ops in prop::collection::vec(op(), 0..24),
        ) {
            let source: List = initial.iter().map(|v| i32::from(*v)).collect();
            let plus_one = map(&source, |v| Value::from(v.as_number().unwrap_or_default() + 1.0));
            for op in &ops {
                apply(&source, op);
                let expected: Vec<Value> = source
                    .to_vec()
                    .iter()
                    .map(|v| Value::from(v.as_number().unwrap_or_default() + 1.0))
                    .collect();
                prop_assert_eq!(plus_one.to_vec(), expected);
            }
        }
    }
}
