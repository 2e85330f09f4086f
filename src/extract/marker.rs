//! Marker comments embedded in source text.
//!
//! ```text
//! /*global*/            first content of a template: emit unscoped
//! /*@toad-debug name*/  anywhere in a template: readable identifier suffix
//! /*@toad-ext .scss*/   anywhere in a file: stylesheet extension override
//! ```

use std::sync::LazyLock;

use regex::Regex;

pub const GLOBAL_MARKER: &str = "/*global*/";

static DEBUG_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*@toad-debug\s+(?P<debug>.+?)\s*\*/").expect("valid regex"));

static EXT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*@toad-ext\s+(?P<ext>.+?)\s*\*/").expect("valid regex"));

/// Whether a trimmed template opts out of class scoping.
pub fn is_global(template: &str) -> bool {
    template.trim_start().starts_with(GLOBAL_MARKER)
}

/// Debug tag of a template, if any.
pub fn debug_tag(template: &str) -> Option<&str> {
    DEBUG_MARKER
        .captures(template)
        .and_then(|caps| caps.name("debug"))
        .map(|m| m.as_str())
}

/// File-level stylesheet extension override, if any.
pub fn output_extension(code: &str) -> Option<String> {
    EXT_MARKER
        .captures(code)
        .and_then(|caps| caps.name("ext"))
        .map(|m| crate::address::normalize_extension(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_marker_must_lead() {
        assert!(is_global("/*global*/ body { margin: 0; }"));
        assert!(is_global("\n   /*global*/\n body {}"));
        assert!(!is_global("color: red; /*global*/"));
    }

    #[test]
    fn test_debug_tag() {
        assert_eq!(debug_tag("/*@toad-debug wrapper*/ max-width: 800px;"), Some("wrapper"));
        assert_eq!(debug_tag("/*@toad-debug  spaced  */"), Some("spaced"));
        assert_eq!(debug_tag("color: red;"), None);
    }

    #[test]
    fn test_output_extension() {
        assert_eq!(output_extension("/*@toad-ext .scss*/\nimport x from 'y'").as_deref(), Some(".scss"));
        assert_eq!(output_extension("/*@toad-ext less */").as_deref(), Some(".less"));
        assert_eq!(output_extension("const a = 1"), None);
    }
}
