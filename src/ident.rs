//! Identifier synthesis for extracted style templates.
//!
//! A [`ClassNamer`] turns the parts of a template into its class name. The
//! default one builds, in order:
//!
//! ```text
//! <relative path without extension>[-global][-<debug tag>]-<slug>
//! ```
//!
//! The slug hashes the template with every `${...}` span removed, so the
//! unevaluated client pass and the evaluated server pass agree on the name
//! even though their template bodies differ.

use std::borrow::Cow;

use crate::address::base_id;
use crate::utils::hash::slug;

/// What a class name is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassNameParts<'a> {
    /// Source path relative to the project root, without extension.
    pub filename: &'a str,
    pub is_global: bool,
    pub debug_name: Option<&'a str>,
    /// Slug of the template with interpolations removed.
    pub hash: &'a str,
}

/// Names the class of one extracted template.
///
/// The name is substituted at the call site verbatim and used as the
/// selector of the template's rule, so it must be a valid class token.
pub trait ClassNamer: Send + Sync {
    fn class_name(&self, parts: &ClassNameParts<'_>) -> String;
}

impl<F> ClassNamer for F
where
    F: Fn(&ClassNameParts<'_>) -> String + Send + Sync,
{
    fn class_name(&self, parts: &ClassNameParts<'_>) -> String {
        self(parts)
    }
}

/// `<filename>[-global][-<debug name>]-<hash>`, sanitized.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassNamer;

impl ClassNamer for DefaultClassNamer {
    fn class_name(&self, parts: &ClassNameParts<'_>) -> String {
        let mut joined: Vec<&str> = Vec::with_capacity(4);
        joined.push(parts.filename);
        if parts.is_global {
            joined.push("global");
        }
        if let Some(name) = parts.debug_name {
            joined.push(name);
        }
        joined.push(parts.hash);
        sanitize(&joined.join("-"))
    }
}

/// Build the class identifier for one template with the default scheme.
///
/// `file_path` is the source path relative to the project root. The debug
/// tag only improves readability; uniqueness comes from the slug.
pub fn make_identifier(
    file_path: &str,
    raw_template: &str,
    is_global: bool,
    debug_tag: Option<&str>,
) -> String {
    name_class(&DefaultClassNamer, file_path, raw_template, is_global, debug_tag)
}

/// Build the class identifier for one template with `namer`.
pub fn name_class(
    namer: &dyn ClassNamer,
    file_path: &str,
    raw_template: &str,
    is_global: bool,
    debug_tag: Option<&str>,
) -> String {
    let hash = template_slug(raw_template);
    namer.class_name(&ClassNameParts {
        filename: base_id(file_path.trim_start_matches('/')),
        is_global,
        debug_name: debug_tag.filter(|t| !t.is_empty()),
        hash: &hash,
    })
}

/// Slug of a template with interpolations removed.
pub fn template_slug(raw_template: &str) -> String {
    slug(strip_interpolations(raw_template).as_ref())
}

/// Remove every `${...}` span, honoring nested braces.
///
/// An unterminated span is removed up to the end of the text.
pub fn strip_interpolations(template: &str) -> Cow<'_, str> {
    if !template.contains("${") {
        return Cow::Borrowed(template);
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let mut depth = 1usize;
        let mut end = after.len();
        for (i, ch) in after.char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        rest = &after[end..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Reduce a string to a valid class-selector token.
///
/// Keeps ASCII letters, digits, `-`, `_` and the U+00A0..=U+FFFF range;
/// everything else becomes `_`, as does a leading digit.
pub fn sanitize(s: &str) -> String {
    let mut out: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || ('\u{a0}'..='\u{ffff}').contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.replace_range(..1, "_");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_is_pure() {
        let a = make_identifier("src/app.tsx", "color: red;", false, None);
        let b = make_identifier("src/app.tsx", "color: red;", false, None);
        assert_eq!(a, b);
        assert!(a.starts_with("src_app-"));
    }

    #[test]
    fn test_identifier_ignores_interpolated_values() {
        let client = make_identifier("app.tsx", "color: ${theme.fg};", false, None);
        let server = make_identifier("app.tsx", "color: ${\"#fff\"};", false, None);
        assert_eq!(client, server);
    }

    #[test]
    fn test_identifier_parts_order() {
        let id = make_identifier("app.tsx", "/*global*/ body {}", true, Some("reset"));
        let slug = template_slug("/*global*/ body {}");
        assert_eq!(id, format!("app-global-reset-{slug}"));
    }

    #[test]
    fn test_distinct_templates_differ() {
        let a = make_identifier("app.tsx", "color: red;", false, None);
        let b = make_identifier("app.tsx", "color: blue;", false, None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_strip_interpolations_nested() {
        assert_eq!(strip_interpolations("a ${x} b"), "a  b");
        assert_eq!(strip_interpolations("a ${f({ k: 1 })}; b ${y}"), "a ; b ");
        assert_eq!(strip_interpolations("a ${unterminated"), "a ");
        assert!(matches!(strip_interpolations("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_custom_namer_sees_parts() {
        fn namer(parts: &ClassNameParts<'_>) -> String {
            format!("x-{}-{}-{}", parts.filename.len(), parts.is_global, parts.hash)
        }
        let id = name_class(&namer, "/src/app.tsx", "color: ${fg};", false, Some(""));
        assert_eq!(id, format!("x-7-false-{}", template_slug("color: ;")));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("src/app.module"), "src_app_module");
        assert_eq!(sanitize("9lives"), "_lives");
        assert_eq!(sanitize("émoji-ok_1"), "émoji-ok_1");
        assert_eq!(sanitize("a b$c"), "a_b_c");
    }
}
