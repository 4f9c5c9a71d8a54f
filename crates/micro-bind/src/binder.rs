#![forbid(unsafe_code)]

//! Binder: wires declared bindings on a node tree to data.
//!
//! For each element, every declaration is parsed, resolved and evaluated
//! before anything is applied. Only when all of them succeed does the binder
//! write the sinks and subscribe to the watchable scopes the references
//! resolved in.
//!
//! ```
//! use micro_bind::{Element, Node, Record, bind};
//!
//! let data = Record::from_iter([("title", "Draft")]);
//! let h1 = Element::new("h1").with_binding("content", "title");
//! let _scope = bind(h1.clone(), &data).unwrap();
//! assert_eq!(h1.text_content(), "Draft");
//!
//! data.set("title", "Final");
//! assert_eq!(h1.text_content(), "Final");
//! ```
//!
//! # Invariants
//!
//! 1. A failing declaration leaves its element untouched: no sink is written
//!    and no watcher registered for any declaration of that element.
//! 2. Traversal visits children in document order, skips bound elements and
//!    does not descend into an element with a content binding.
//! 3. Each `(scope, root)` pair of a declaration is watched once.
//! 4. Dropping the returned [`BindingScope`] disconnects every watcher of the
//!    bound subtree, including those of projected instances.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, debug_span, error, trace};

use crate::config::BindConfig;
use crate::error::{BindError, Declaration};
use crate::expr::{self, Arg};
use crate::node::{Element, Node};
use crate::record::Record;
use crate::scope::{Scope, ScopeStack};
use crate::target::{PrefixResolver, Target, TargetResolver};
use crate::transform::{TransformContext, Transforms};
use crate::value::Value;
use crate::watch::BindingScope;

/// Bind `root` to `data` with the default [`Binder`].
pub fn bind(root: impl Into<Node>, data: &Record) -> Result<BindingScope, BindError> {
    Binder::default().bind(root, data)
}

/// Binding configuration: transforms, target resolution and the handler for
/// errors raised by live re-evaluation.
///
/// Cloning is cheap; clones share the transform table.
#[derive(Clone)]
pub struct Binder {
    transforms: Transforms,
    resolver: Rc<dyn TargetResolver>,
    config: Rc<BindConfig>,
    on_error: Rc<dyn Fn(&BindError)>,
}

impl Default for Binder {
    fn default() -> Self {
        Self {
            transforms: Transforms::global(),
            resolver: Rc::new(PrefixResolver::default()),
            config: Rc::new(BindConfig::default()),
            on_error: Rc::new(|err: &BindError| error!(error = %err, "binding update failed")),
        }
    }
}

impl Binder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_transforms(mut self, transforms: Transforms) -> Self {
        self.transforms = transforms;
        self
    }

    /// Use `config`, and a [`PrefixResolver`] built from it.
    #[must_use]
    pub fn with_config(mut self, config: BindConfig) -> Self {
        self.resolver = Rc::new(PrefixResolver::from(&config));
        self.config = Rc::new(config);
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: impl TargetResolver + 'static) -> Self {
        self.resolver = Rc::new(resolver);
        self
    }

    /// Handle errors from re-evaluations triggered by data changes. The
    /// default handler emits a `tracing` error event.
    #[must_use]
    pub fn with_error_handler(mut self, handler: impl Fn(&BindError) + 'static) -> Self {
        self.on_error = Rc::new(handler);
        self
    }

    #[must_use]
    pub fn transforms(&self) -> &Transforms {
        &self.transforms
    }

    #[must_use]
    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    pub(crate) fn report(&self, err: &BindError) {
        (self.on_error)(err);
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Bind `root` against `data`, falling back to the transform table.
    pub fn bind(&self, root: impl Into<Node>, data: &Record) -> Result<BindingScope, BindError> {
        self.bind_scope(root, Rc::new(data.clone()))
    }

    /// Bind `root` against any scope, falling back to the transform table.
    pub fn bind_scope(
        &self,
        root: impl Into<Node>,
        scope: Rc<dyn Scope>,
    ) -> Result<BindingScope, BindError> {
        let scopes = ScopeStack::new([scope, Rc::new(self.transforms.clone()) as Rc<dyn Scope>]);
        self.bind_stack(root, &scopes)
    }

    /// Bind `root` against `scopes` as given.
    pub fn bind_stack(
        &self,
        root: impl Into<Node>,
        scopes: &ScopeStack,
    ) -> Result<BindingScope, BindError> {
        let mut out = BindingScope::new();
        self.bind_root(&root.into(), scopes, &mut out)?;
        Ok(out)
    }

    /// Bind several roots against `data` into one scope.
    pub fn bind_all<I>(&self, roots: I, data: &Record) -> Result<BindingScope, BindError>
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        let scopes = ScopeStack::new([
            Rc::new(data.clone()) as Rc<dyn Scope>,
            Rc::new(self.transforms.clone()) as Rc<dyn Scope>,
        ]);
        let mut out = BindingScope::new();
        for root in roots {
            self.bind_root(&root.into(), &scopes, &mut out)?;
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    fn bind_root(
        &self,
        root: &Node,
        scopes: &ScopeStack,
        out: &mut BindingScope,
    ) -> Result<(), BindError> {
        match root {
            Node::Element(element) if element.is_bound() => Err(BindError::AlreadyBound {
                element: element.describe(),
            }),
            Node::Element(element) => self.bind_element(element, scopes, out),
            Node::Fragment(fragment) => {
                for child in fragment.children() {
                    self.bind_root(&child, scopes, out)?;
                }
                Ok(())
            }
            Node::Text(_) => Ok(()),
        }
    }

    fn bind_element(
        &self,
        element: &Element,
        scopes: &ScopeStack,
        out: &mut BindingScope,
    ) -> Result<(), BindError> {
        let span = debug_span!("bind_element", element = %element.describe());
        let _guard = span.enter();

        let templates: Vec<Node> = element
            .children()
            .into_iter()
            .filter(|node| matches!(node, Node::Element(_)))
            .collect();

        let mut prepared = Vec::new();
        for (target, expression) in element.declarations() {
            prepared.push(self.prepare(element, &target, &expression, scopes, &templates)?);
        }
        let evaluated = prepared
            .iter()
            .map(|(record, _)| record.evaluate())
            .collect::<Result<Vec<_>, _>>()?;

        element.mark_bound();
        let subscriptions_before = out.subscription_count();
        let mut has_content = false;
        for ((record, roots), (value, nested)) in prepared.into_iter().zip(evaluated) {
            has_content |= record.target == Target::Content;
            record.commit(value, nested);
            let record = Rc::new(record);
            for (index, root) in roots {
                let Some(scope) = scopes.get(index) else {
                    continue;
                };
                let weak = Rc::downgrade(&record);
                let callback = Box::new(move |_: &str, _: &Value| {
                    if let Some(record) = weak.upgrade() {
                        record.update();
                    }
                });
                if let Some(sub) = scope.subscribe(&root, callback) {
                    out.hold(sub);
                }
            }
            out.retain(record);
        }
        debug!(
            subscriptions = out.subscription_count() - subscriptions_before,
            "element bound"
        );

        if !has_content {
            for child in element.children() {
                if let Node::Element(child) = child {
                    if !child.is_bound() {
                        self.bind_element(&child, scopes, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Parse and resolve one declaration. Returns the binding and the
    /// `(scope index, root)` pairs to watch.
    fn prepare(
        &self,
        element: &Element,
        target: &str,
        expression: &str,
        scopes: &ScopeStack,
        templates: &[Node],
    ) -> Result<(BindingRecord, Vec<(usize, String)>), BindError> {
        let declaration = Declaration::new(element, target, expression);
        let args = expr::parse(expression);
        if args.is_empty() {
            return Err(BindError::Syntax { declaration });
        }

        let mut roots: Vec<(usize, String)> = Vec::new();
        let mut resolved = Vec::with_capacity(args.len());
        for arg in &args {
            let Arg::Reference(reference) = arg else {
                resolved.push(None);
                continue;
            };
            let root = reference.root();
            let Some((index, _)) = scopes.resolve(root) else {
                return Err(BindError::Reference {
                    name: root.to_owned(),
                    declaration,
                });
            };
            resolved.push(Some(index));
            if !roots.iter().any(|(i, r)| *i == index && r == root) {
                roots.push((index, root.to_owned()));
            }
        }

        let record = BindingRecord {
            element: element.clone(),
            target: self.resolver.resolve(target),
            declaration,
            args,
            resolved,
            scopes: scopes.clone(),
            templates: templates.to_vec(),
            binder: self.clone(),
            nested: RefCell::new(BindingScope::new()),
        };
        Ok((record, roots))
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("transforms", &self.transforms)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// BindingRecord: one live declaration
// ---------------------------------------------------------------------------

struct BindingRecord {
    element: Element,
    target: Target,
    declaration: Declaration,
    args: Vec<Arg>,
    /// Scope index each reference resolved to at bind time, `None` for
    /// literals.
    resolved: Vec<Option<usize>>,
    scopes: ScopeStack,
    templates: Vec<Node>,
    binder: Binder,
    /// Whatever the last evaluation bound or subscribed.
    nested: RefCell<BindingScope>,
}

impl BindingRecord {
    /// Read `arg` from the scope it resolved to at bind time.
    fn resolve(&self, arg: &Arg, scope: Option<usize>) -> Result<Value, BindError> {
        match arg {
            Arg::Literal(value) => Ok(value.clone()),
            Arg::Reference(reference) => match scope.and_then(|i| self.scopes.get(i)) {
                Some(scope) => Ok(scope
                    .lookup(reference.root())
                    .map_or(Value::Undefined, |value| value.get_path(reference.path()))),
                None => Err(BindError::Reference {
                    name: reference.root().to_owned(),
                    declaration: self.declaration.clone(),
                }),
            },
        }
    }

    fn evaluate(&self) -> Result<(Value, BindingScope), BindError> {
        let values = self
            .args
            .iter()
            .zip(&self.resolved)
            .map(|(arg, scope)| self.resolve(arg, *scope))
            .collect::<Result<Vec<_>, _>>()?;

        let Some((first, rest)) = values.split_first() else {
            return Err(BindError::Syntax {
                declaration: self.declaration.clone(),
            });
        };
        if rest.is_empty() {
            return Ok((first.clone(), BindingScope::new()));
        }
        let Value::Function(transform) = first else {
            let name = match &self.args[0] {
                Arg::Reference(reference) => reference.text.clone(),
                Arg::Literal(value) => value.to_text(),
            };
            return Err(BindError::Type {
                name,
                kind: first.kind(),
                declaration: self.declaration.clone(),
            });
        };

        let ctx = TransformContext::new(
            &self.element,
            &self.templates,
            &self.scopes,
            &self.declaration,
            &self.binder,
        );
        let value = transform.call(&ctx, rest)?;
        Ok((value, ctx.into_retained()))
    }

    /// Install `nested`, write the sink, then release the previous nested
    /// scope.
    fn commit(&self, value: Value, nested: BindingScope) {
        let previous = self.nested.replace(nested);
        self.apply(value);
        drop(previous);
    }

    fn apply(&self, value: Value) {
        match &self.target {
            Target::Content => match value {
                Value::Node(node) => self.element.replace_children([node]),
                other => self.element.set_text(&other.to_text()),
            },
            Target::Class(class) => self.element.toggle_class(class, value.is_truthy()),
            Target::Property(name) => self.element.set_property(name.as_str(), value),
        }
    }

    fn update(&self) {
        trace!(declaration = %self.declaration, "binding update");
        match self.evaluate() {
            Ok((value, nested)) => self.commit(value, nested),
            Err(err) => self.binder.report(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::List;
    use crate::node::Fragment;
    use crate::transform::{Transform, arg};
    use std::cell::Cell;
    use tracing_test::traced_test;

    fn markup(element: &Element) -> String {
        Node::from(element.clone()).to_markup()
    }

    #[test]
    fn content_text_and_round_trip() {
        let data = Record::from_iter([("name", "old")]);
        let p = Element::new("p")
            .with_text("placeholder")
            .with_binding("content", "name");
        let _scope = bind(p.clone(), &data).unwrap();
        assert_eq!(markup(&p), "<p>old</p>");

        data.set("name", "new");
        assert_eq!(markup(&p), "<p>new</p>");
        assert_eq!(p.text_content(), "new");
    }

    #[test]
    fn nullish_content_is_empty() {
        let data = Record::from_iter([("name", Value::Null)]);
        let p = Element::new("p").with_binding("content", "name");
        let _scope = bind(p.clone(), &data).unwrap();
        assert_eq!(p.child_count(), 0);
    }

    #[test]
    fn class_toggles_by_truthiness() {
        let data = Record::from_iter([("active", false)]);
        let li = Element::new("li")
            .with_class("item")
            .with_binding("classIsActive", "active");
        let _scope = bind(li.clone(), &data).unwrap();
        assert!(!li.has_class("is-active"));

        data.set("active", true);
        assert_eq!(li.classes(), ["item", "is-active"]);

        data.set("active", 0);
        assert_eq!(li.classes(), ["item"]);
    }

    #[test]
    fn property_gets_raw_value() {
        let data = Record::from_iter([("count", 3)]);
        let input = Element::new("input").with_binding("value", "count");
        let _scope = bind(input.clone(), &data).unwrap();
        assert_eq!(input.property("value"), Some(Value::from(3)));
    }

    #[test]
    fn dotted_path_watches_root_only() {
        let user = Record::from_iter([("name", "Ada")]);
        let data = Record::from_iter([("user", Value::from(user.clone()))]);
        let p = Element::new("p").with_binding("content", "user.name");
        let _scope = bind(p.clone(), &data).unwrap();
        assert_eq!(p.text_content(), "Ada");

        user.set("name", "Grace");
        assert_eq!(p.text_content(), "Ada");

        data.set("user", Record::from_iter([("name", "Grace")]));
        assert_eq!(p.text_content(), "Grace");
    }

    #[test]
    fn missing_path_segment_is_empty() {
        let data = Record::from_iter([("user", Value::Null)]);
        let p = Element::new("p").with_binding("content", "user.name.first");
        let _scope = bind(p.clone(), &data).unwrap();
        assert_eq!(p.text_content(), "");
    }

    #[test]
    fn reference_error_applies_nothing() {
        let data = Record::from_iter([("title", "T")]);
        let p = Element::new("p")
            .with_text("keep")
            .with_binding("title", "title")
            .with_binding("content", "missing.title");

        let err = bind(p.clone(), &data).unwrap_err();
        match &err {
            BindError::Reference { name, declaration } => {
                assert_eq!(name, "missing");
                assert_eq!(declaration.expression, "missing.title");
                assert_eq!(declaration.element, "<p>");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(p.property("title"), None);
        assert_eq!(markup(&p), "<p>keep</p>");
        assert!(!p.is_bound());
        assert_eq!(data.watcher_count(), 0);
    }

    #[test]
    fn empty_expression_is_syntax_error() {
        let p = Element::new("p").with_binding("content", "   ");
        let err = bind(p, &Record::new()).unwrap_err();
        assert!(matches!(err, BindError::Syntax { .. }));
    }

    #[test]
    fn non_function_call_is_type_error() {
        let data = Record::from_iter([("name", "Ada")]);
        let p = Element::new("p").with_binding("content", "name 1");
        let err = bind(p, &data).unwrap_err();
        assert!(matches!(
            err,
            BindError::Type { ref name, kind: "string", .. } if name == "name"
        ));
    }

    #[test]
    fn already_bound_root() {
        let data = Record::from_iter([("x", 1)]);
        let p = Element::new("p").with_binding("content", "x");
        let _scope = bind(p.clone(), &data).unwrap();
        let err = bind(p, &data).unwrap_err();
        assert!(matches!(err, BindError::AlreadyBound { .. }));
    }

    #[test]
    fn traversal_skips_bound_and_content_subtrees() {
        let data = Record::from_iter([("a", "A"), ("b", "B")]);
        let inner = Element::new("span").with_binding("content", "b");
        let _inner_scope = bind(inner.clone(), &data).unwrap();

        let under_content = Element::new("i").with_binding("content", "b");
        let root = Element::new("div")
            .with_child(inner.clone())
            .with_child(
                Element::new("p")
                    .with_binding("title", "a")
                    .with_child(Element::new("b").with_binding("content", "a")),
            )
            .with_child(
                Element::new("section")
                    .with_binding("content", "a")
                    .with_child(under_content.clone()),
            );

        let _scope = bind(root.clone(), &data).unwrap();
        assert_eq!(
            markup(&root),
            r#"<div><span>B</span><p title="A"><b>A</b></p><section>A</section></div>"#
        );
        assert!(!under_content.is_bound());
    }

    #[test]
    fn fragment_root_binds_children() {
        let data = Record::from_iter([("x", "X")]);
        let a = Element::new("a").with_binding("content", "x");
        let b = Element::new("b").with_binding("content", "x");
        let fragment = Fragment::from_nodes([Node::from(a.clone()), Node::from(b.clone())]);
        let _scope = bind(fragment, &data).unwrap();
        assert_eq!(a.text_content(), "X");
        assert_eq!(b.text_content(), "X");
    }

    #[test]
    fn bind_all_shares_one_scope() {
        let data = Record::from_iter([("x", "X")]);
        let a = Element::new("a").with_binding("content", "x");
        let b = Element::new("b").with_binding("content", "x");
        let scope = Binder::default().bind_all([a.clone(), b.clone()], &data).unwrap();
        assert_eq!(scope.subscription_count(), 2);

        drop(scope);
        data.set("x", "Y");
        assert_eq!(a.text_content(), "X");
        assert_eq!(data.watcher_count(), 0);
    }

    #[test]
    fn same_root_is_watched_once() {
        let data = Record::from_iter([("n", 1)]);
        let p = Element::new("p").with_binding("content", "eq n n");
        let scope = bind(p, &data).unwrap();
        assert_eq!(scope.subscription_count(), 1);
        assert_eq!(data.watcher_count(), 1);
    }

    #[test]
    fn transform_call_with_literals() {
        let data = Record::from_iter([("name", "Ada")]);
        let p = Element::new("p").with_binding("content", "format 'Hello {n}!' 'n' name");
        let _scope = bind(p.clone(), &data).unwrap();
        assert_eq!(p.text_content(), "Hello Ada!");
    }

    #[test]
    fn custom_transforms_and_scope_precedence() {
        let transforms = Transforms::new();
        transforms.register("shout", |_, args| {
            Ok(Value::from(arg(args, 0).to_text().to_uppercase()))
        });
        let binder = Binder::default().with_transforms(transforms);

        let data = Record::from_iter([("word", "hi")]);
        let p = Element::new("p").with_binding("content", "shout word");
        let _scope = binder.bind(p.clone(), &data).unwrap();
        assert_eq!(p.text_content(), "HI");

        // Data shadows the transform table.
        let local = Transform::new(|_, _| Ok(Value::from("local")));
        let data = Record::from_iter([("word", Value::from("hi")), ("shout", Value::from(local))]);
        let q = Element::new("p").with_binding("content", "shout word");
        let _scope = binder.bind(q.clone(), &data).unwrap();
        assert_eq!(q.text_content(), "local");
    }

    #[test]
    fn reevaluation_is_idempotent() {
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let transforms = Transforms::new();
        transforms.register("count", move |_, args| {
            c.set(c.get() + 1);
            Ok(Value::from(arg(args, 0).to_text().len()))
        });
        let data = Record::from_iter([("s", "abc")]);
        let p = Element::new("p").with_binding("content", "count s");
        let _scope = Binder::default()
            .with_transforms(transforms)
            .bind(p.clone(), &data)
            .unwrap();

        data.set("s", "abc");
        data.set("s", "abc");
        assert_eq!(calls.get(), 3);
        assert_eq!(markup(&p), "<p>3</p>");
    }

    #[test]
    fn references_keep_their_bind_time_scope() {
        let errors = Rc::new(Cell::new(0));
        let e = Rc::clone(&errors);
        let binder = Binder::default().with_error_handler(move |_| e.set(e.get() + 1));
        let data = Record::from_iter([("flag", false)]);
        let p = Element::new("p").with_binding("content", "not flag");
        let _scope = binder.bind(p.clone(), &data).unwrap();
        assert_eq!(p.text_content(), "true");

        data.set("not", "shadow");
        data.set("flag", true);
        assert_eq!(p.text_content(), "false");
        assert_eq!(errors.get(), 0);
    }

    #[test]
    fn config_changes_target_names() {
        let config = BindConfig {
            content_target: "body".into(),
            class_prefix: "toggle".into(),
            ..BindConfig::default()
        };
        let data = Record::from_iter([("on", Value::from(true)), ("text", Value::from("T"))]);
        let p = Element::new("p")
            .with_binding("body", "text")
            .with_binding("toggleLit", "on");
        let _scope = Binder::default().with_config(config).bind(p.clone(), &data).unwrap();
        assert_eq!(markup(&p), r#"<p class="lit">T</p>"#);
    }

    #[test]
    fn live_errors_go_to_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let binder =
            Binder::default().with_error_handler(move |err| s.borrow_mut().push(err.clone()));

        let f = Transform::new(|_, args| Ok(arg(args, 0)));
        let data = Record::from_iter([("f", Value::from(f)), ("x", Value::from("ok"))]);
        let p = Element::new("p").with_binding("content", "f x");
        let _scope = binder.bind(p.clone(), &data).unwrap();
        assert_eq!(p.text_content(), "ok");

        data.set("f", "not callable");
        assert_eq!(p.text_content(), "ok");
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], BindError::Type { kind: "string", .. }));
    }

    #[test]
    #[traced_test]
    fn default_handler_logs_live_errors() {
        let f = Transform::new(|_, args| Ok(arg(args, 0)));
        let data = Record::from_iter([("f", Value::from(f)), ("x", Value::from(1))]);
        let p = Element::new("p").with_binding("content", "f x");
        let _scope = bind(p, &data).unwrap();

        data.set("f", 5);
        assert!(logs_contain("binding update failed"));
    }

    #[test]
    fn dropping_scope_disconnects_projection() {
        let items = List::from_iter(["a"]);
        let data = Record::from_iter([("items", Value::from(items.clone()))]);
        let ul = Element::new("ul")
            .with_binding("content", "list items")
            .with_child(Element::new("li").with_binding("content", "item"));
        let scope = bind(ul.clone(), &data).unwrap();
        assert!(items.watcher_count() > 0);

        drop(scope);
        assert_eq!(items.watcher_count(), 0);
        assert_eq!(data.watcher_count(), 0);
        items.push(["b"]);
        assert_eq!(markup(&ul), "<ul><li>a</li></ul>");
    }
}
