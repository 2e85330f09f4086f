//! Style template extraction.
//!
//! Two strategies locate tagged templates in a source file and rewrite each
//! call site to the string literal of its generated class name:
//!
//! | Strategy            | Locates call sites with                    |
//! |---------------------|--------------------------------------------|
//! | [`SyntaxExtractor`] | oxc syntax tree (also merges attributes)   |
//! | [`PatternExtractor`]| one regular expression over the raw text   |
//!
//! Both produce the same ordered entries for the same input. The strategy
//! is chosen once from configuration by [`strategy`].

pub mod marker;
mod pattern;
pub mod splice;
mod syntax;

pub use pattern::PatternExtractor;
pub use syntax::SyntaxExtractor;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, ExtractMode, ToadConfig};
use crate::entry::StyleEntry;
use crate::ident::{ClassNamer, name_class};

/// One source file handed to an extractor.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    /// Module id, used to pick the parser dialect.
    pub id: &'a str,
    /// Path relative to the project root, used for identifiers.
    pub relative: &'a str,
    pub code: &'a str,
}

impl<'a> SourceFile<'a> {
    pub fn new(id: &'a str, relative: &'a str, code: &'a str) -> Self {
        Self { id, relative, code }
    }
}

/// Result of extracting one file.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub rewritten: String,
    /// In call-site order.
    pub entries: Vec<StyleEntry>,
    /// Stylesheet extension requested by a file-level marker.
    pub output_extension: Option<String>,
    pub warnings: Vec<ExtractWarning>,
}

impl Extraction {
    /// An extraction that leaves the code as-is.
    pub fn unchanged(code: &str) -> Self {
        Self {
            rewritten: code.to_string(),
            ..Self::default()
        }
    }
}

/// The whole file could not be processed.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to parse `{id}`: {message}")]
    Parse { id: String, message: String },
}

/// One call site was skipped; the rest of the file is still processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractWarning {
    #[error("`{attribute}` at offset {offset}: cannot merge into a `class` value of kind {kind}")]
    UnsupportedClassValue {
        attribute: String,
        kind: &'static str,
        offset: u32,
    },

    #[error("`{attribute}` at offset {offset}: unsupported value of kind {kind}")]
    UnsupportedAttributeValue {
        attribute: String,
        kind: &'static str,
        offset: u32,
    },

    #[error("attribute merge skipped: {0}")]
    AttributePassSkipped(String),
}

/// A way of locating and rewriting style templates.
pub trait ExtractStrategy: Send + Sync {
    fn extract(&self, source: &SourceFile<'_>) -> Result<Extraction, ExtractError>;
}

/// Build the strategy selected by configuration, naming classes with `namer`.
pub fn strategy(
    config: &ToadConfig,
    namer: Arc<dyn ClassNamer>,
) -> Result<Box<dyn ExtractStrategy>, ConfigError> {
    let attribute = config.attribute().map(str::to_string);
    Ok(match config.mode {
        ExtractMode::Syntax => {
            Box::new(SyntaxExtractor::new(&config.tag, attribute).with_class_namer(namer))
        }
        ExtractMode::Pattern => Box::new(
            PatternExtractor::new(&config.tag, attribute)
                .map_err(|source| ConfigError::Pattern {
                    field: "tag",
                    pattern: config.tag.clone(),
                    source,
                })?
                .with_class_namer(namer),
        ),
    })
}

/// Build the entry for one template body as found between the backticks.
pub(crate) fn build_entry(namer: &dyn ClassNamer, relative: &str, body: &str) -> StyleEntry {
    let raw = body.trim();
    let is_global = marker::is_global(raw);
    let identifier = name_class(namer, relative, raw, is_global, marker::debug_tag(raw));
    StyleEntry::new(identifier, raw, is_global)
}

/// Quote a string as a JavaScript string literal.
pub(crate) fn js_string(s: &str) -> String {
    // JSON strings are valid JS string literals
    serde_json::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{ClassNameParts, DefaultClassNamer};
    use crate::stylesheet::{DefaultRenderer, StyleRenderer};

    const SCENARIO: &str = "\
const a = css`background: red;`;
css`/*global*/ body { margin: 0; }`;
export default a;
";

    fn both() -> Vec<Box<dyn ExtractStrategy>> {
        vec![
            Box::new(SyntaxExtractor::new("css", None)),
            Box::new(PatternExtractor::new("css", None).unwrap()),
        ]
    }

    #[test]
    fn test_strategies_agree_on_entries() {
        let source = SourceFile::new("/src/app.tsx", "src/app.tsx", SCENARIO);
        let [syntax, pattern]: [Extraction; 2] = both()
            .iter()
            .map(|s| s.extract(&source).unwrap())
            .collect::<Vec<_>>()
            .try_into()
            .unwrap();
        assert_eq!(syntax.entries, pattern.entries);
        assert_eq!(syntax.entries.len(), 2);
        assert!(!syntax.entries[0].is_global);
        assert!(syntax.entries[1].is_global);
        assert_eq!(syntax.entries[0].raw_template, "background: red;");
    }

    #[test]
    fn test_strategies_skip_member_and_prefixed_tags() {
        let code = "\
const a = theme.css`color: red;`;
const b = $css`color: blue;`;
const c = mycss`margin: 0;`;
const d = css`padding: 0;`;
";
        let source = SourceFile::new("/src/app.tsx", "src/app.tsx", code);
        let [syntax, pattern]: [Extraction; 2] = both()
            .iter()
            .map(|s| s.extract(&source).unwrap())
            .collect::<Vec<_>>()
            .try_into()
            .unwrap();
        assert_eq!(syntax.entries, pattern.entries);
        assert_eq!(pattern.entries.len(), 1);
        assert_eq!(pattern.entries[0].raw_template, "padding: 0;");
        assert_eq!(syntax.rewritten, pattern.rewritten);
        assert!(pattern.rewritten.contains("theme.css`color: red;`"));
        assert!(pattern.rewritten.contains("$css`color: blue;`"));
        assert!(pattern.rewritten.contains("mycss`margin: 0;`"));
    }

    #[test]
    fn test_custom_class_namer_reaches_code_and_sheet() {
        fn namer(parts: &ClassNameParts<'_>) -> String {
            format!("tw-{}", &parts.hash[..4])
        }

        let config = ToadConfig::default();
        for mode in [ExtractMode::Syntax, ExtractMode::Pattern] {
            let config = ToadConfig {
                mode,
                ..config.clone()
            };
            let strategy = strategy(&config, Arc::new(namer)).unwrap();
            let source = SourceFile::new("/src/app.tsx", "src/app.tsx", SCENARIO);
            let out = strategy.extract(&source).unwrap();

            let scoped = &out.entries[0];
            assert!(scoped.identifier.starts_with("tw-"));
            assert!(out.rewritten.contains(&format!("const a = \"{}\";", scoped.identifier)));
            let sheet = DefaultRenderer.render(&out.entries);
            assert!(sheet.contains(&format!(".{} {{ background: red; }}", scoped.identifier)));
        }
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let source = SourceFile::new("/src/app.tsx", "src/app.tsx", SCENARIO);
        for strategy in both() {
            let first = strategy.extract(&source).unwrap();
            let again = SourceFile::new("/src/app.tsx", "src/app.tsx", &first.rewritten);
            let second = strategy.extract(&again).unwrap();
            assert!(second.entries.is_empty());
            assert_eq!(second.rewritten, first.rewritten);
        }
    }

    #[test]
    fn test_output_extension_marker() {
        let code = "/*@toad-ext .scss*/\nconst a = css`color: red;`;";
        let source = SourceFile::new("/a.tsx", "a.tsx", code);
        for strategy in both() {
            let out = strategy.extract(&source).unwrap();
            assert_eq!(out.output_extension.as_deref(), Some(".scss"));
        }
    }

    #[test]
    fn test_build_entry_trims_and_flags() {
        let entry = build_entry(&DefaultClassNamer, "a.tsx", "\n  /*global*/ /*@toad-debug reset*/ html {}\n");
        assert!(entry.is_global);
        assert_eq!(entry.raw_template, "/*global*/ /*@toad-debug reset*/ html {}");
        assert!(entry.identifier.starts_with("a-global-reset-"));
    }

    #[test]
    fn test_js_string() {
        assert_eq!(js_string("a \"b\""), r#""a \"b\"""#);
    }

    #[test]
    fn test_strategy_from_config() {
        let config = ToadConfig {
            mode: ExtractMode::Pattern,
            ..ToadConfig::default()
        };
        let strategy = strategy(&config, Arc::new(DefaultClassNamer)).unwrap();
        let out = strategy
            .extract(&SourceFile::new("/a.ts", "a.ts", "x = css`a: b;`"))
            .unwrap();
        assert_eq!(out.entries.len(), 1);
    }
}
