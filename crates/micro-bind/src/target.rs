#![forbid(unsafe_code)]

//! Sink selection: what a declared binding target writes to.

use crate::config::BindConfig;

/// Where the value of a binding goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Replace the element's children with a node, or with text.
    Content,
    /// Add or remove a class depending on truthiness.
    Class(String),
    /// Set a property on the element.
    Property(String),
}

/// Maps a declared target name to a [`Target`].
pub trait TargetResolver {
    fn resolve(&self, name: &str) -> Target;
}

/// Default resolver: a fixed content name and a class-toggle prefix.
///
/// With the default config, `content` is [`Target::Content`],
/// `classActiveItem` is [`Target::Class`]`("active-item")`, and every other
/// name is a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixResolver {
    content_target: String,
    class_prefix: String,
}

impl PrefixResolver {
    #[must_use]
    pub fn new(content_target: impl Into<String>, class_prefix: impl Into<String>) -> Self {
        Self {
            content_target: content_target.into(),
            class_prefix: class_prefix.into(),
        }
    }
}

impl Default for PrefixResolver {
    fn default() -> Self {
        Self::from(&BindConfig::default())
    }
}

impl From<&BindConfig> for PrefixResolver {
    fn from(config: &BindConfig) -> Self {
        Self::new(config.content_target.clone(), config.class_prefix.clone())
    }
}

impl TargetResolver for PrefixResolver {
    fn resolve(&self, name: &str) -> Target {
        if name == self.content_target {
            return Target::Content;
        }
        if !self.class_prefix.is_empty() {
            if let Some(rest) = name.strip_prefix(self.class_prefix.as_str()) {
                if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                    return Target::Class(camel_to_dash(rest));
                }
            }
        }
        Target::Property(name.to_owned())
    }
}

/// `ActiveItem` / `activeItem` → `active-item`.
#[must_use]
pub fn camel_to_dash(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
