#![forbid(unsafe_code)]

//! Reactive data binding for micro.
//!
//! - [`Record`] and [`List`]: watchable containers that notify watchers
//!   synchronously on every write or splice.
//! - [`filter`] and [`map`]: derived lists kept in step with their source.
//! - [`bind`] / [`Binder`]: connect declared bindings on a [`Node`] tree to
//!   data. Declarations are small expressions such as
//!   `format 'Hi {n}' 'n' user.name` or `list items`.
//! - [`Transforms`]: the open table of named functions expressions can call,
//!   including the template projections `list`, `join`, `switch` and
//!   `render`.
//!
//! # Architecture
//!
//! All handles are `Rc` based and single-threaded. Watchers are stored as
//! `Weak` callbacks; the strong side is the [`Subscription`] returned by
//! [`Watch::watch`]. Everything a bound subtree needs to stay live is owned
//! by the [`BindingScope`] returned from `bind`, so dropping it disconnects
//! the subtree.
//!
//! Mutations notify depth first: a watcher that writes to another watchable
//! runs that write's full notification pass before the outer pass continues.
//!
//! # Feature Flags
//!
//! The `config` feature adds loading of [`BindConfig`] from TOML and JSON.

mod binder;
mod config;
mod error;
pub mod expr;
mod list;
mod node;
mod projection;
mod record;
mod scope;
mod target;
mod transform;
mod value;
mod views;
mod watch;

pub use binder::{Binder, bind};
#[cfg(feature = "config")]
pub use config::ConfigError;
pub use config::BindConfig;
pub use error::{BindError, Declaration};
pub use list::List;
pub use node::{Element, Fragment, Node, Text};
pub use record::Record;
pub use scope::{Scope, ScopeStack};
pub use target::{PrefixResolver, Target, TargetResolver, camel_to_dash};
pub use transform::{Transform, TransformContext, TransformFn, Transforms};
pub use value::Value;
pub use views::{filter, map};
pub use watch::{BindingScope, Subscription, Watch, WatchFn, WatchKey};
