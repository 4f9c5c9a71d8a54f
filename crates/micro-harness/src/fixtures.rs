//! Reference node trees and data used across integration tests.

use micro_bind::{Element, List, Record, Value, filter};

/// A todo item record.
#[must_use]
pub fn todo(text: &str, done: bool) -> Record {
    Record::from_iter([("text", Value::from(text)), ("done", Value::from(done))])
}

/// A todo list page: a title, the open todos as a live list, and a status
/// line chosen by `switch`.
pub struct TodoPage {
    pub data: Record,
    pub todos: List,
    pub open: List,
    pub root: Element,
}

impl TodoPage {
    #[must_use]
    pub fn new(items: &[(&str, bool)]) -> Self {
        let todos: List = items
            .iter()
            .map(|&(text, done)| Value::from(todo(text, done)))
            .collect();
        let open = filter(&todos, |item, _, _| !item.get("done").is_truthy());
        let data = Record::from_iter([
            ("title", Value::from("Todo")),
            ("todos", Value::from(todos.clone())),
            ("open", Value::from(open.clone())),
            ("state", Value::from(if items.is_empty() { "empty" } else { "busy" })),
        ]);

        let root = Element::new("section")
            .with_child(Element::new("h1").with_binding("content", "title"))
            .with_child(
                Element::new("ul")
                    .with_binding("content", "list open 'todo'")
                    .with_child(
                        Element::new("li")
                            .with_class("todo")
                            .with_binding("content", "todo.text"),
                    ),
            )
            .with_child(
                Element::new("p")
                    .with_binding("content", "switch state 'empty'")
                    .with_child(Element::new("em").with_text("Nothing to do"))
                    .with_child(Element::new("span").with_binding("content", "open.length")),
            );

        Self {
            data,
            todos,
            open,
            root,
        }
    }

    /// Mark the todo at `index` of the full list done, by replacing it.
    pub fn complete(&self, index: usize) {
        if let Some(item) = self.todos.get(index) {
            let text = item.get("text").to_text();
            self.todos.set(index, todo(&text, true));
        }
    }
}
