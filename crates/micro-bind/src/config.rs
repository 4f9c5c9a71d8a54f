#![forbid(unsafe_code)]

//! Binder configuration.
//!
//! With the `config` feature, a [`BindConfig`] can be loaded from a TOML or
//! JSON document. Missing fields keep their defaults; unknown fields are
//! rejected.
//!
//! ```toml
//! content_target = "content"
//! class_prefix = "class"
//! join_separator = ", "
//! ```

/// Naming conventions and defaults used by the binder.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "config",
    derive(serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct BindConfig {
    /// Target name that replaces the element's children.
    pub content_target: String,
    /// Prefix of target names that toggle a class.
    pub class_prefix: String,
    /// Separator `join` uses when none is given.
    pub join_separator: String,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            content_target: "content".to_owned(),
            class_prefix: "class".to_owned(),
            join_separator: ", ".to_owned(),
        }
    }
}

#[cfg(feature = "config")]
pub use loading::ConfigError;

#[cfg(feature = "config")]
mod loading {
    use std::path::{Path, PathBuf};

    use super::BindConfig;

    /// Errors from loading a [`BindConfig`].
    #[derive(Debug, thiserror::Error)]
    pub enum ConfigError {
        #[error("failed to read {}: {source}", path.display())]
        Io {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("invalid TOML config: {0}")]
        Toml(#[from] toml::de::Error),
        #[error("invalid JSON config: {0}")]
        Json(#[from] serde_json::Error),
        #[error("unsupported config format: {}", .0.display())]
        UnsupportedFormat(PathBuf),
    }

    impl BindConfig {
        /// Parse a TOML document.
        pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
            Ok(toml::from_str(text)?)
        }

        /// Parse a JSON document.
        pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
            Ok(serde_json::from_str(text)?)
        }

        /// Load from a `.toml` or `.json` file.
        pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_owned(),
                source,
            })?;
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => Self::from_toml_str(&text),
                Some("json") => Self::from_json_str(&text),
                _ => Err(ConfigError::UnsupportedFormat(path.to_owned())),
            }
        }
    }

}
