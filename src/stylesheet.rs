//! Stylesheet synthesis from ordered entries.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

use crate::entry::StyleEntry;

/// Turns an ordered entry list into stylesheet text.
///
/// Implementations must keep entry order and map each scoped entry to a
/// rule for its identifier.
pub trait StyleRenderer: Send + Sync {
    fn render(&self, entries: &[StyleEntry]) -> String;
}

/// Scoped entries become `.<identifier> { <template> }`; global entries are
/// emitted verbatim between blank lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRenderer;

impl StyleRenderer for DefaultRenderer {
    fn render(&self, entries: &[StyleEntry]) -> String {
        let mut sheet = String::new();
        for entry in entries {
            sheet.push('\n');
            if entry.is_global {
                sheet.push('\n');
                sheet.push_str(&entry.raw_template);
                sheet.push('\n');
            } else {
                sheet.push('.');
                sheet.push_str(&entry.identifier);
                sheet.push_str(" { ");
                sheet.push_str(&entry.raw_template);
                sheet.push_str(" }\n");
            }
        }
        sheet
    }
}

/// Runs another renderer, then minifies the result with lightningcss.
///
/// Sheets lightningcss cannot parse (preprocessor syntax, unresolved
/// interpolations) are returned unminified.
pub struct MinifyingRenderer<R = DefaultRenderer> {
    inner: R,
}

impl<R: StyleRenderer> MinifyingRenderer<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl Default for MinifyingRenderer {
    fn default() -> Self {
        Self::new(DefaultRenderer)
    }
}

impl<R: StyleRenderer> StyleRenderer for MinifyingRenderer<R> {
    fn render(&self, entries: &[StyleEntry]) -> String {
        let sheet = self.inner.render(entries);
        match minify_css(&sheet) {
            Some(minified) => minified,
            None => {
                crate::debug!("style"; "minification skipped, sheet did not parse");
                sheet
            }
        }
    }
}

/// Minify CSS source, `None` if it does not parse.
pub fn minify_css(source: &str) -> Option<String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_render_scenario() {
        let entries = [
            StyleEntry::new("app-1a2b3c4d", "background: red;", false),
            StyleEntry::new("app-global-5e6f7a8b", "/*global*/ body { margin: 0; }", true),
        ];
        let sheet = DefaultRenderer.render(&entries);
        assert_eq!(
            sheet,
            "\n.app-1a2b3c4d { background: red; }\n\n\n/*global*/ body { margin: 0; }\n"
        );
    }

    #[test]
    fn test_render_preserves_order() {
        let entries = [
            StyleEntry::new("c", "z: 3;", false),
            StyleEntry::new("a", "x: 1;", false),
            StyleEntry::new("b", "y: 2;", false),
        ];
        let sheet = DefaultRenderer.render(&entries);
        let c = sheet.find(".c").unwrap();
        let a = sheet.find(".a").unwrap();
        let b = sheet.find(".b").unwrap();
        assert!(c < a && a < b);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(DefaultRenderer.render(&[]), "");
    }

    #[test]
    fn test_minifying_renderer() {
        let entries = [StyleEntry::new("a", "color: red;  margin: 0px;", false)];
        let sheet = MinifyingRenderer::new(DefaultRenderer).render(&entries);
        assert!(!sheet.contains('\n'));
        assert!(sheet.starts_with(".a{"));
    }
}
