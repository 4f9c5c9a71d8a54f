#![forbid(unsafe_code)]

//! Test harness and reference fixtures for micro-bind.
//!
//! - [`assert_markup!`]: compare the markup of a node with an expected string.
//! - [`assert_snapshot!`]: compare the markup of a node with a stored
//!   snapshot under `tests/snapshots/`. Run with `BLESS=1` to create or
//!   update snapshots.
//! - [`EventLog`]: records watcher calls in order, optionally tagged.
//! - [`init_test_tracing`]: route `tracing` output to the test writer,
//!   filtered by `RUST_LOG`.
//! - [`fixtures`]: small node trees shared by the integration tests.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Once;

use micro_bind::{Node, Value};
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub mod fixtures;

// ============================================================================
// Tracing
// ============================================================================

static TRACING: Once = Once::new();

/// Install a test subscriber once per process. `RUST_LOG` overrides the
/// default `micro_bind=debug,micro_harness=debug` filter.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("micro_bind=debug,micro_harness=debug"));
        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer().with_target(true))
            .try_init();
    });
}

// ============================================================================
// Event recording
// ============================================================================

/// One recorded watcher call.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub tag: String,
    pub key: String,
    pub value: Value,
}

/// Ordered record of watcher calls, shared across every recorder it hands
/// out.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A watcher callback that appends untagged events.
    pub fn recorder(&self) -> impl Fn(&str, &Value) + 'static {
        self.tagged("")
    }

    /// A watcher callback that appends events tagged with `tag`.
    pub fn tagged(&self, tag: impl Into<String>) -> impl Fn(&str, &Value) + 'static {
        let events = Rc::clone(&self.events);
        let tag = tag.into();
        move |key, value| {
            events.borrow_mut().push(Event {
                tag: tag.clone(),
                key: key.to_owned(),
                value: value.clone(),
            });
        }
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Events as `(key, text)` pairs, tags dropped.
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.events
            .borrow()
            .iter()
            .map(|event| (event.key.clone(), event.value.to_text()))
            .collect()
    }

    /// Events as `tag:key=text` lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .map(|event| format!("{}:{}={}", event.tag, event.key, event.value.to_text()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// JSON lines, one object per event.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        self.events
            .borrow()
            .iter()
            .map(|event| {
                serde_json::json!({
                    "tag": event.tag,
                    "key": event.key,
                    "kind": event.value.kind(),
                    "value": event.value.to_text(),
                })
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Markup assertions
// ============================================================================

/// Markup of anything convertible into a node.
pub fn markup(node: impl Into<Node>) -> String {
    node.into().to_markup()
}

/// Assert that a node renders to the expected markup.
#[macro_export]
macro_rules! assert_markup {
    ($node:expr, $expected:expr $(,)?) => {{
        let actual = $crate::markup($node.clone());
        let expected: &str = $expected;
        assert_eq!(actual, expected, "markup mismatch");
    }};
}

/// Assert that a node renders to the markup stored in
/// `tests/snapshots/<name>.snap` of the calling crate.
#[macro_export]
macro_rules! assert_snapshot {
    ($name:expr, $node:expr $(,)?) => {{
        let actual = $crate::markup($node.clone());
        $crate::check_snapshot($name, &actual, env!("CARGO_MANIFEST_DIR"));
    }};
}

/// Path of the snapshot `name` under `manifest_dir`.
#[must_use]
pub fn snapshot_path(name: &str, manifest_dir: &str) -> PathBuf {
    Path::new(manifest_dir)
        .join("tests")
        .join("snapshots")
        .join(format!("{name}.snap"))
}

/// Compare `actual` with the stored snapshot, or write it when `BLESS` is
/// set. Surrounding whitespace is ignored.
///
/// # Panics
///
/// Panics on mismatch, on a missing snapshot without `BLESS`, or when the
/// snapshot cannot be written.
pub fn check_snapshot(name: &str, actual: &str, manifest_dir: &str) {
    let bless = std::env::var_os("BLESS").is_some_and(|v| v != "0");
    compare_or_bless(name, actual, &snapshot_path(name, manifest_dir), bless);
}

fn compare_or_bless(name: &str, actual: &str, path: &Path, bless: bool) {
    if bless {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create snapshot directory");
        }
        std::fs::write(path, format!("{actual}\n")).expect("write snapshot");
        info!(snapshot = name, path = %path.display(), "snapshot blessed");
        return;
    }

    let expected = std::fs::read_to_string(path).unwrap_or_else(|_| {
        panic!(
            "missing snapshot {} (run with BLESS=1 to create it)",
            path.display()
        )
    });
    debug!(snapshot = name, bytes = actual.len(), "snapshot compared");
    assert_eq!(
        actual.trim(),
        expected.trim(),
        "snapshot '{name}' mismatch (run with BLESS=1 to update)"
    );
}
