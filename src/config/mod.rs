//! Plugin configuration management for `toad.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── error      # ConfigError
//! ├── filter     # SourceFilter (include / exclude)
//! ├── section    # [custom_attribute], [ssr], [watch]
//! └── mod.rs     # ToadConfig (this file)
//! ```
//!
//! # Example
//!
//! ```toml
//! include = ['\.(t|j)sx?$']
//! exclude = ['node_modules']
//! tag = "css"
//! output_extension = ".css"
//! mode = "syntax"            # or "pattern"
//! minify = false
//! ```

mod error;
mod filter;
mod section;

pub use error::ConfigError;
pub use filter::SourceFilter;
pub use section::{AttributeConfig, Command, ExtractMode, SsrConfig, WatchConfig};

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{address, log};

/// Root configuration structure representing toad.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToadConfig {
    /// Project root directory, set by the embedding host or CLI
    #[serde(skip)]
    pub root: PathBuf,

    /// Host command, set by the embedding host or CLI
    #[serde(skip)]
    pub command: Command,

    /// Regexes a source id must match to be processed.
    pub include: Vec<String>,

    /// Regexes excluding a source id.
    pub exclude: Vec<String>,

    /// Template tag name.
    pub tag: String,

    /// Default extension of virtual stylesheets.
    pub output_extension: String,

    pub mode: ExtractMode,

    /// Post-process stylesheets through lightningcss.
    pub minify: bool,

    pub custom_attribute: AttributeConfig,

    pub ssr: SsrConfig,

    pub watch: WatchConfig,
}

impl Default for ToadConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            command: Command::default(),
            include: vec![r"\.(t|j)sx?$".to_string()],
            exclude: vec!["node_modules".to_string()],
            tag: "css".to_string(),
            output_extension: ".css".to_string(),
            mode: ExtractMode::default(),
            minify: false,
            custom_attribute: AttributeConfig::default(),
            ssr: SsrConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl ToadConfig {
    /// Load `path` if it exists, defaults otherwise. Root is the file's parent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_path(path)?
        } else {
            crate::debug!("config"; "{} not found, using defaults", path.display());
            Self::default()
        };
        config.root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.finalize()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        config.finalize()?;
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    fn finalize(&mut self) -> Result<(), ConfigError> {
        self.validate()?;
        self.output_extension = address::normalize_extension(&self.output_extension);
        Ok(())
    }

    /// Check field values that serde alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_js_identifier(&self.tag) {
            return Err(ConfigError::Validation(format!(
                "`tag` must be a JavaScript identifier, got `{}`",
                self.tag
            )));
        }
        if self.custom_attribute.enable && !is_attribute_name(&self.custom_attribute.name) {
            return Err(ConfigError::Validation(format!(
                "`custom_attribute.name` is not a valid attribute name: `{}`",
                self.custom_attribute.name
            )));
        }
        if self.output_extension.trim().trim_start_matches('.').is_empty() {
            return Err(ConfigError::Validation(
                "`output_extension` must not be empty".to_string(),
            ));
        }
        self.source_filter()?;
        Ok(())
    }

    /// Compiled include/exclude lists.
    pub fn source_filter(&self) -> Result<SourceFilter, ConfigError> {
        SourceFilter::new(&self.include, &self.exclude)
    }

    /// Attribute to merge into `class`, if the merge is enabled.
    pub fn attribute(&self) -> Option<&str> {
        self.custom_attribute
            .enable
            .then_some(self.custom_attribute.name.as_str())
    }

    pub fn is_serve(&self) -> bool {
        self.command == Command::Serve
    }

    /// Get path relative to the project root, `/`-separated with a leading `/`.
    pub fn root_relative_id(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("/{}", joined.trim_start_matches('/'))
    }
}

fn is_js_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn is_attribute_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Parse a config for tests, panicking on invalid input.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ToadConfig {
    ToadConfig::from_str(content).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.tag, "css");
        assert_eq!(config.output_extension, ".css");
        assert_eq!(config.mode, ExtractMode::Syntax);
        assert!(!config.ssr.eval);
        assert_eq!(config.attribute(), None);
        assert_eq!(config.watch.ws_port, 24680);
        assert_eq!(config.watch.out_dir, PathBuf::from("toad-out"));
    }

    #[test]
    fn test_full_config() {
        let config = test_parse_config(
            r#"
            tag = "styled"
            output_extension = "scss"
            mode = "pattern"
            minify = true

            [custom_attribute]
            enable = true
            name = "sx"

            [ssr]
            eval = true
            merge_attributes = true

            [watch]
            ws_port = 9000
            "#,
        );
        assert_eq!(config.tag, "styled");
        assert_eq!(config.output_extension, ".scss");
        assert_eq!(config.mode, ExtractMode::Pattern);
        assert!(config.minify);
        assert_eq!(config.attribute(), Some("sx"));
        assert!(config.ssr.eval && config.ssr.merge_attributes);
        assert_eq!(config.watch.ws_port, 9000);
    }

    #[test]
    fn test_invalid_tag() {
        let err = ToadConfig::from_str("tag = \"my-css\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_empty_extension() {
        let err = ToadConfig::from_str("output_extension = \".\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_include_pattern() {
        let err = ToadConfig::from_str("include = ['[']").unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { field: "include", .. }));
    }

    #[test]
    fn test_load_missing_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToadConfig::load(&dir.path().join("toad.toml")).unwrap();
        assert_eq!(config.tag, "css");
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn test_load_tolerates_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toad.toml");
        fs::write(&path, "tag = \"sx\"\nunknown = 1\n").unwrap();
        let config = ToadConfig::load(&path).unwrap();
        assert_eq!(config.tag, "sx");
    }

    #[test]
    fn test_root_relative_id() {
        let config = ToadConfig {
            root: PathBuf::from("/project"),
            ..ToadConfig::default()
        };
        assert_eq!(
            config.root_relative_id(Path::new("/project/src/app.tsx")),
            "/src/app.tsx"
        );
    }
}
