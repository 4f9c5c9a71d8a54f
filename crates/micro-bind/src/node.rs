#![forbid(unsafe_code)]

//! In-memory UI node tree that bindings write into.
//!
//! The tree mirrors the parts of a document model the binder needs:
//! elements with properties, classes, children and declared bindings, text
//! nodes, and detached fragments. All handles are shared (`Rc`), so cloning a
//! [`Node`] yields another reference to the same node; use
//! [`Node::deep_clone`] to instantiate a template.
//!
//! Nodes do not track their parent. Inserting the same node under two
//! elements makes it appear in both child lists.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::value::Value;

/// A node in the UI tree.
#[derive(Clone)]
pub enum Node {
    Element(Element),
    Text(Text),
    Fragment(Fragment),
}

impl Node {
    /// Shorthand for a new text node.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(Text::new(content))
    }

    /// Concatenated text of this node and its descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        match self {
            Self::Element(element) => element.text_content(),
            Self::Text(text) => text.get(),
            Self::Fragment(fragment) => fragment.text_content(),
        }
    }

    /// Recursive copy with fresh identity and no bound markers.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        match self {
            Self::Element(element) => Self::Element(element.deep_clone()),
            Self::Text(text) => Self::Text(Text::new(text.get())),
            Self::Fragment(fragment) => Self::Fragment(Fragment::from_nodes(
                fragment.children().iter().map(Node::deep_clone),
            )),
        }
    }

    /// Deterministic markup rendering, for tests and debugging.
    #[must_use]
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Self::Element(element) => element.write_markup(out),
            Self::Text(text) => escape_into(out, &text.get(), false),
            Self::Fragment(fragment) => {
                for child in fragment.children() {
                    child.write_markup(out);
                }
            }
        }
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Whether both handles point at the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => a.ptr_eq(b),
            (Self::Text(a), Self::Text(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Self::Fragment(a), Self::Fragment(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<Text> for Node {
    fn from(text: Text) -> Self {
        Self::Text(text)
    }
}

impl From<Fragment> for Node {
    fn from(fragment: Fragment) -> Self {
        Self::Fragment(fragment)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markup())
    }
}

/// A text node.
#[derive(Clone)]
pub struct Text(Rc<RefCell<String>>);

impl Text {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(content.into())))
    }

    #[must_use]
    pub fn get(&self) -> String {
        self.0.borrow().clone()
    }

    pub fn set(&self, content: impl Into<String>) {
        *self.0.borrow_mut() = content.into();
    }
}

/// A detached list of nodes. Inserting a fragment into an element moves its
/// children there and leaves the fragment empty.
#[derive(Clone, Default)]
pub struct Fragment(Rc<RefCell<Vec<Node>>>);

impl Fragment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self(Rc::new(RefCell::new(nodes.into_iter().collect())))
    }

    pub fn append(&self, node: impl Into<Node>) {
        let node = node.into();
        match node {
            Node::Fragment(other) => {
                let moved = other.take();
                self.0.borrow_mut().extend(moved);
            }
            node => self.0.borrow_mut().push(node),
        }
    }

    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Move all children out of the fragment.
    pub fn take(&self) -> Vec<Node> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    fn text_content(&self) -> String {
        self.0.borrow().iter().map(Node::text_content).collect()
    }
}

struct ElementInner {
    tag: String,
    properties: RefCell<AHashMap<String, Value>>,
    classes: RefCell<Vec<String>>,
    children: RefCell<Vec<Node>>,
    declarations: RefCell<Vec<(String, String)>>,
    bound: Cell<bool>,
}

/// An element: tag, properties, classes, children and declared bindings.
///
/// ```
/// use micro_bind::{Element, Node};
///
/// let item = Element::new("li")
///     .with_class("item")
///     .with_binding("content", "item.title");
/// let list = Element::new("ul").with_child(item);
/// assert_eq!(Node::from(list).to_markup(), r#"<ul><li class="item"></li></ul>"#);
/// ```
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl Element {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                tag: tag.into(),
                properties: RefCell::new(AHashMap::new()),
                classes: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                declarations: RefCell::new(Vec::new()),
                bound: Cell::new(false),
            }),
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    // --- builder helpers ---

    #[must_use]
    pub fn with_child(self, child: impl Into<Node>) -> Self {
        self.append(child);
        self
    }

    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.append(Node::text(text));
        self
    }

    #[must_use]
    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.toggle_class(&class.into(), true);
        self
    }

    #[must_use]
    pub fn with_property(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Declare a binding of `target` to `expression`.
    #[must_use]
    pub fn with_binding(self, target: impl Into<String>, expression: impl Into<String>) -> Self {
        self.declare(target, expression);
        self
    }

    // --- declarations ---

    pub fn declare(&self, target: impl Into<String>, expression: impl Into<String>) {
        self.inner
            .declarations
            .borrow_mut()
            .push((target.into(), expression.into()));
    }

    /// Declared `(target, expression)` pairs, in declaration order.
    #[must_use]
    pub fn declarations(&self) -> Vec<(String, String)> {
        self.inner.declarations.borrow().clone()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.bound.get()
    }

    pub(crate) fn mark_bound(&self) {
        self.inner.bound.set(true);
    }

    // --- children ---

    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Option<Node> {
        self.inner.children.borrow().get(index).cloned()
    }

    /// Append `node`. Fragments contribute their children.
    pub fn append(&self, node: impl Into<Node>) {
        let len = self.child_count();
        self.insert_child(len, node);
    }

    /// Insert `node` before the child at `index` (clamped to the child
    /// count). Fragments contribute their children.
    pub fn insert_child(&self, index: usize, node: impl Into<Node>) {
        let nodes = match node.into() {
            Node::Fragment(fragment) => fragment.take(),
            node => vec![node],
        };
        let mut children = self.inner.children.borrow_mut();
        let index = index.min(children.len());
        children.splice(index..index, nodes);
    }

    pub fn remove_child(&self, index: usize) -> Option<Node> {
        let mut children = self.inner.children.borrow_mut();
        (index < children.len()).then(|| children.remove(index))
    }

    /// Replace all children with `nodes`. Fragments contribute their children.
    pub fn replace_children(&self, nodes: impl IntoIterator<Item = Node>) {
        let mut flat = Vec::new();
        for node in nodes {
            match node {
                Node::Fragment(fragment) => flat.extend(fragment.take()),
                node => flat.push(node),
            }
        }
        *self.inner.children.borrow_mut() = flat;
    }

    #[must_use]
    pub fn text_content(&self) -> String {
        self.inner
            .children
            .borrow()
            .iter()
            .map(Node::text_content)
            .collect()
    }

    /// Replace all children with a single text node (none for empty text).
    pub fn set_text(&self, text: &str) {
        let children = if text.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(text)]
        };
        *self.inner.children.borrow_mut() = children;
    }

    // --- properties and classes ---

    #[must_use]
    pub fn property(&self, name: &str) -> Option<Value> {
        self.inner.properties.borrow().get(name).cloned()
    }

    pub fn set_property(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .properties
            .borrow_mut()
            .insert(name.into(), value.into());
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.inner.classes.borrow().iter().any(|c| c == class)
    }

    #[must_use]
    pub fn classes(&self) -> Vec<String> {
        self.inner.classes.borrow().clone()
    }

    /// Add (`on == true`) or remove `class`. Adding an existing class keeps
    /// its position.
    pub fn toggle_class(&self, class: &str, on: bool) {
        let mut classes = self.inner.classes.borrow_mut();
        let present = classes.iter().position(|c| c == class);
        match (present, on) {
            (None, true) => classes.push(class.to_owned()),
            (Some(i), false) => {
                classes.remove(i);
            }
            _ => {}
        }
    }

    // --- identity and rendering ---

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn deep_clone(&self) -> Self {
        let copy = Self::new(self.inner.tag.clone());
        *copy.inner.properties.borrow_mut() = self.inner.properties.borrow().clone();
        *copy.inner.classes.borrow_mut() = self.inner.classes.borrow().clone();
        *copy.inner.declarations.borrow_mut() = self.inner.declarations.borrow().clone();
        *copy.inner.children.borrow_mut() =
            self.children().iter().map(Node::deep_clone).collect();
        copy
    }

    /// Opening tag with classes, used to identify the element in errors.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.write_open_tag(&mut out);
        out
    }

    fn write_open_tag(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.inner.tag);
        let classes = self.inner.classes.borrow();
        if !classes.is_empty() {
            out.push_str(" class=\"");
            escape_into(out, &classes.join(" "), true);
            out.push('"');
        }
        let properties = self.inner.properties.borrow();
        let mut entries: Vec<(&String, &Value)> = properties.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in entries {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_into(out, &value.to_text(), true);
            out.push('"');
        }
        out.push('>');
    }

    fn write_markup(&self, out: &mut String) {
        self.write_open_tag(out);
        for child in self.inner.children.borrow().iter() {
            child.write_markup(out);
        }
        out.push_str("</");
        out.push_str(&self.inner.tag);
        out.push('>');
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            ch => out.push(ch),
        }
    }
}
