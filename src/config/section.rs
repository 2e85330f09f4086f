//! Nested `toad.toml` sections.
//!
//! ```toml
//! [custom_attribute]
//! enable = true      # merge the attribute into `class`
//! name = "css"
//!
//! [ssr]
//! eval = true                # resolve interpolations in a server pass
//! merge_attributes = true    # run the attribute merge there too
//!
//! [watch]
//! out_dir = "toad-out"
//! ws_port = 24680
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How templates are located in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// Walk the oxc syntax tree.
    #[default]
    Syntax,
    /// Single regular expression over raw text.
    Pattern,
}

/// Which host command the pipeline runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    Serve,
    Build,
}

/// Markup attribute merged into `class`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
    pub enable: bool,
    pub name: String,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            enable: false,
            name: "css".to_string(),
        }
    }
}

/// Server-rendering pass settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrConfig {
    /// Evaluate the rewritten module to resolve `${...}` values.
    pub eval: bool,
    /// Apply the attribute merge in the server transform as well.
    pub merge_attributes: bool,
}

/// `toad watch` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory the virtual stylesheets are written to, relative to root.
    pub out_dir: PathBuf,
    /// Port of the notification websocket.
    pub ws_port: u16,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("toad-out"),
            ws_port: 24680,
        }
    }
}
