#![forbid(unsafe_code)]

//! Template projection transforms: `list`, `join`, `switch` and `render`.
//!
//! Templates are the element children a bound element had before its first
//! render (see [`TransformContext::templates`]). Each instance is a deep
//! clone of a template, bound against the caller's scope stack or a nested
//! item scope in front of it.
//!
//! A missing template renders an empty fragment. The one fatal
//! misconfiguration is a `switch` whose template count does not fit its
//! cases.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::binder::Binder;
use crate::error::BindError;
use crate::list::List;
use crate::node::{Element, Fragment, Node, Text};
use crate::record::Record;
use crate::scope::ScopeStack;
use crate::transform::{TransformContext, Transforms, arg};
use crate::value::Value;
use crate::watch::{BindingScope, Watch, WatchKey};

const DEFAULT_ITEM_KEY: &str = "item";

pub(crate) fn register(transforms: &Transforms) {
    transforms.register("list", list);
    transforms.register("join", join);
    transforms.register("switch", switch);
    transforms.register("render", render);
}

fn empty() -> Value {
    Value::Node(Fragment::new().into())
}

fn item_key(value: Value) -> String {
    if value.is_nullish() {
        DEFAULT_ITEM_KEY.to_owned()
    } else {
        value.to_text()
    }
}

/// Live projection of a list into the children of the bound element.
struct ListProjection {
    element: Element,
    template: Node,
    item_key: String,
    scopes: ScopeStack,
    binder: Binder,
    entries: RefCell<Vec<ItemEntry>>,
}

/// Per-item state. Dropping it unbinds the instance.
struct ItemEntry {
    record: Record,
    _bindings: BindingScope,
}

impl ListProjection {
    fn instantiate(&self, item: Value) -> Result<(Node, ItemEntry), BindError> {
        let node = self.template.deep_clone();
        let record = Record::from_iter([(self.item_key.clone(), item)]);
        let scopes = self.scopes.prepend(Rc::new(record.clone()));
        let bindings = self.binder.bind_stack(node.clone(), &scopes)?;
        Ok((
            node,
            ItemEntry {
                record,
                _bindings: bindings,
            },
        ))
    }

    /// An unbound, empty stand-in for an item whose instance failed to bind.
    fn placeholder(&self, item: Value) -> (Node, ItemEntry) {
        let entry = ItemEntry {
            record: Record::from_iter([(self.item_key.clone(), item)]),
            _bindings: BindingScope::new(),
        };
        (Text::new("").into(), entry)
    }

    fn insert(&self, index: usize, item: &Value) {
        let (node, entry) = self.instantiate(item.clone()).unwrap_or_else(|err| {
            self.binder.report(&err);
            self.placeholder(item.clone())
        });
        let index = {
            let mut entries = self.entries.borrow_mut();
            let index = index.min(entries.len());
            entries.insert(index, entry);
            index
        };
        self.element.insert_child(index, node);
        trace!(index, "list item inserted");
    }

    fn remove(&self, index: usize) {
        let entry = {
            let mut entries = self.entries.borrow_mut();
            (index < entries.len()).then(|| entries.remove(index))
        };
        if entry.is_some() {
            self.element.remove_child(index);
            trace!(index, "list item removed");
        }
    }

    fn change(&self, index: usize, item: &Value) {
        let record = self
            .entries
            .borrow()
            .get(index)
            .map(|entry| entry.record.clone());
        if let Some(record) = record {
            record.set(self.item_key.clone(), item.clone());
        }
    }
}

/// `list items [item_key]`: one live template instance per item.
fn list(ctx: &TransformContext<'_>, args: &[Value]) -> Result<Value, BindError> {
    let Value::List(source) = arg(args, 0) else {
        return Ok(empty());
    };
    let Some(template) = ctx.templates().first().cloned() else {
        debug!(declaration = %ctx.declaration(), "list without template");
        return Ok(empty());
    };

    let state = Rc::new(ListProjection {
        element: ctx.element().clone(),
        template,
        item_key: item_key(arg(args, 1)),
        scopes: ctx.scopes().clone(),
        binder: ctx.binder().clone(),
        entries: RefCell::new(Vec::new()),
    });

    let fragment = Fragment::new();
    for item in source.to_vec() {
        let (node, entry) = state.instantiate(item)?;
        fragment.append(node);
        state.entries.borrow_mut().push(entry);
    }

    watch_source(ctx, &source, &state);
    ctx.retain(state);
    Ok(Value::Node(fragment.into()))
}

fn watch_source(ctx: &TransformContext<'_>, source: &List, state: &Rc<ListProjection>) {
    let weak = Rc::downgrade(state);
    ctx.hold(source.watch(WatchKey::Remove, move |key, _| {
        if let (Some(state), Ok(index)) = (weak.upgrade(), key.parse()) {
            state.remove(index);
        }
    }));
    let weak = Rc::downgrade(state);
    ctx.hold(source.watch(WatchKey::Insert, move |key, value| {
        if let (Some(state), Ok(index)) = (weak.upgrade(), key.parse()) {
            state.insert(index, value);
        }
    }));
    let weak = Rc::downgrade(state);
    ctx.hold(source.watch(WatchKey::Any, move |key, value| {
        if let (Some(state), Ok(index)) = (weak.upgrade(), key.parse()) {
            state.change(index, value);
        }
    }));
}

/// `join items [item_key] [separator]`: one-shot instances with text
/// separators between them.
fn join(ctx: &TransformContext<'_>, args: &[Value]) -> Result<Value, BindError> {
    let Value::List(source) = arg(args, 0) else {
        return Ok(empty());
    };
    let Some(template) = ctx.templates().first() else {
        return Ok(empty());
    };
    let key = item_key(arg(args, 1));
    let separator = match arg(args, 2) {
        Value::Undefined => ctx.binder().config().join_separator.clone(),
        value => value.to_text(),
    };

    let fragment = Fragment::new();
    for (i, item) in source.to_vec().into_iter().enumerate() {
        if i > 0 {
            fragment.append(Node::text(separator.as_str()));
        }
        let node = template.deep_clone();
        let record = Record::from_iter([(key.as_str(), item)]);
        ctx.bind_with(&node, &ctx.scopes().prepend(Rc::new(record)))?;
        fragment.append(node);
    }
    Ok(Value::Node(fragment.into()))
}

/// `switch value case...`: the template of the first case equal to `value`,
/// else the trailing default template.
fn switch(ctx: &TransformContext<'_>, args: &[Value]) -> Result<Value, BindError> {
    let value = arg(args, 0);
    let cases = args.get(1..).unwrap_or_default();
    let templates = ctx.templates();
    if templates.len() != cases.len() && templates.len() != cases.len() + 1 {
        return Err(ctx.configuration_error(format!(
            "switch has {} cases but {} templates",
            cases.len(),
            templates.len()
        )));
    }

    let chosen = cases
        .iter()
        .position(|case| *case == value)
        .map_or_else(|| templates.get(cases.len()), |i| templates.get(i));
    let Some(template) = chosen else {
        return Ok(empty());
    };
    let node = template.deep_clone();
    ctx.bind(&node)?;
    Ok(Value::Node(node))
}

/// `render [template]`: the given node, else the first template.
fn render(ctx: &TransformContext<'_>, args: &[Value]) -> Result<Value, BindError> {
    let template = match arg(args, 0) {
        Value::Node(node) => Some(node),
        _ => ctx.templates().first().cloned(),
    };
    let Some(template) = template else {
        return Ok(empty());
    };
    let node = template.deep_clone();
    ctx.bind(&node)?;
    Ok(Value::Node(node))
}
