//! Regex-based extraction.
//!
//! Matches `<tag>` followed by a backtick template and substitutes the call
//! site textually. Nested backticks inside `${...}` are not understood; use
//! the syntax strategy for such templates.

use std::sync::Arc;

use regex::{Captures, Regex};

use super::{
    ExtractError, ExtractStrategy, ExtractWarning, Extraction, SourceFile, SyntaxExtractor,
    build_entry, js_string, marker,
};
use crate::ident::{ClassNamer, DefaultClassNamer};

pub struct PatternExtractor {
    regex: Regex,
    namer: Arc<dyn ClassNamer>,
    /// Attribute-only syntax pass run after substitution.
    attributes: Option<SyntaxExtractor>,
}

impl PatternExtractor {
    pub fn new(tag: &str, attribute: Option<String>) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(r"{}\s*`([\s\S]*?)`", regex::escape(tag)))?;
        Ok(Self {
            regex,
            namer: Arc::new(DefaultClassNamer),
            attributes: attribute.map(SyntaxExtractor::attributes_only),
        })
    }

    pub fn with_class_namer(mut self, namer: Arc<dyn ClassNamer>) -> Self {
        self.namer = namer;
        self
    }
}

/// Whether the match at `start` is the tag itself rather than the tail of a
/// longer identifier (`mycss`, `$css`) or a member access (`theme.css`).
fn is_bare_tag(code: &str, start: usize) -> bool {
    let before = &code[..start];
    if before
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
    {
        return false;
    }
    !before.trim_end().ends_with('.')
}

impl ExtractStrategy for PatternExtractor {
    fn extract(&self, source: &SourceFile<'_>) -> Result<Extraction, ExtractError> {
        let mut entries = Vec::new();
        let rewritten = self
            .regex
            .replace_all(source.code, |caps: &Captures<'_>| {
                let start = caps.get(0).map_or(0, |m| m.start());
                if !is_bare_tag(source.code, start) {
                    return caps[0].to_string();
                }
                let entry = build_entry(self.namer.as_ref(), source.relative, &caps[1]);
                let replacement = if entry.is_global {
                    String::new()
                } else {
                    js_string(&entry.identifier)
                };
                entries.push(entry);
                replacement
            })
            .into_owned();

        let mut extraction = Extraction {
            rewritten,
            entries,
            output_extension: marker::output_extension(source.code),
            warnings: Vec::new(),
        };

        if let Some(attributes) = &self.attributes {
            let pass = SourceFile::new(source.id, source.relative, &extraction.rewritten);
            match attributes.extract(&pass) {
                Ok(merged) => {
                    extraction.rewritten = merged.rewritten;
                    extraction.warnings = merged.warnings;
                }
                Err(err) => extraction
                    .warnings
                    .push(ExtractWarning::AttributePassSkipped(err.to_string())),
            }
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> Extraction {
        PatternExtractor::new("css", None)
            .unwrap()
            .extract(&SourceFile::new("/a.tsx", "a.tsx", code))
            .unwrap()
    }

    #[test]
    fn test_replaces_call_sites_in_order() {
        let out = run("const a = css`color: red;`; const b = css `color: blue;`;");
        assert_eq!(out.entries.len(), 2);
        let expected = format!(
            "const a = \"{}\"; const b = \"{}\";",
            out.entries[0].identifier, out.entries[1].identifier
        );
        assert_eq!(out.rewritten, expected);
    }

    #[test]
    fn test_global_removed() {
        let out = run("css`/*global*/ body { margin: 0; }`;");
        assert_eq!(out.rewritten, ";");
        assert!(out.entries[0].is_global);
    }

    #[test]
    fn test_other_tags_untouched() {
        let code = "const q = sql`select 1`; const s = mycss`x`;";
        let out = run(code);
        assert!(out.entries.is_empty());
        assert_eq!(out.rewritten, code);
    }

    #[test]
    fn test_member_and_prefixed_tags_untouched() {
        let code = "a = theme.css`x: 1;`; b = $css`x: 2;`; c = theme\n  .css`x: 3;`; d = _css`x: 4;`;";
        let out = run(code);
        assert!(out.entries.is_empty());
        assert_eq!(out.rewritten, code);
    }

    #[test]
    fn test_tag_at_start_of_file() {
        let out = run("css`color: red;`");
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.rewritten, format!("\"{}\"", out.entries[0].identifier));
    }

    #[test]
    fn test_multiline_template() {
        let out = run("const a = css`\n  color: red;\n  margin: 0;\n`;");
        assert_eq!(out.entries[0].raw_template, "color: red;\n  margin: 0;");
    }

    #[test]
    fn test_attribute_pass_after_substitution() {
        let code = "const el = <div css={css`color: red;`} />;";
        let out = PatternExtractor::new("css", Some("css".into()))
            .unwrap()
            .extract(&SourceFile::new("/a.tsx", "a.tsx", code))
            .unwrap();
        let id = &out.entries[0].identifier;
        assert!(out.rewritten.contains(&format!("class=\"{id}\"")));
        assert!(!out.rewritten.contains("css="));
        assert!(out.warnings.is_empty());
    }
}
