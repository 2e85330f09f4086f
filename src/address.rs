//! Virtual module id namespace.
//!
//! ```text
//! /@toad/module/<source path>          virtual code module (server pass)
//! /@toad/style/<source path sans ext><ext>   virtual stylesheet
//! ```
//!
//! Both are derived from the real source id alone, so any component can
//! recompute them without consulting the registry.

/// Prefix shared by every synthesized id.
pub const VIRTUAL_PREFIX: &str = "/@toad/";
/// Code sub-namespace.
pub const MODULE_PREFIX: &str = "/@toad/module/";
/// Style sub-namespace.
pub const STYLE_PREFIX: &str = "/@toad/style/";
/// Query parameter that disables every transformation for one fetch.
pub const SKIP_QUERY: &str = "toad-full-skip";

/// A module request split into id and query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub id: &'a str,
    pub query: Option<&'a str>,
}

impl<'a> Request<'a> {
    pub fn parse(url: &'a str) -> Self {
        match url.split_once('?') {
            Some((id, query)) => Self {
                id,
                query: Some(query),
            },
            None => Self {
                id: url,
                query: None,
            },
        }
    }

    /// Whether the caller asked for the pristine source.
    pub fn is_skipped(&self) -> bool {
        self.query.is_some_and(|q| q.contains(SKIP_QUERY))
    }
}

pub fn is_virtual(id: &str) -> bool {
    id.starts_with(VIRTUAL_PREFIX)
}

pub fn is_virtual_module(id: &str) -> bool {
    id.starts_with(MODULE_PREFIX)
}

pub fn is_virtual_style(id: &str) -> bool {
    id.starts_with(STYLE_PREFIX)
}

/// Virtual code id for a real source id.
pub fn virtual_module_id(source_id: &str) -> String {
    format!("{MODULE_PREFIX}{}", source_id.trim_start_matches('/'))
}

/// Real source id behind a virtual code id.
pub fn real_module_id(virtual_id: &str) -> Option<String> {
    virtual_id
        .strip_prefix(MODULE_PREFIX)
        .map(|rest| format!("/{rest}"))
}

/// Virtual stylesheet id for a real source id and output extension.
pub fn virtual_style_id(source_id: &str, extension: &str) -> String {
    format!(
        "{STYLE_PREFIX}{}{}",
        base_id(source_id.trim_start_matches('/')),
        normalize_extension(extension)
    )
}

/// Id with the extension of its last segment removed.
pub fn base_id(id: &str) -> &str {
    let segment_start = id.rfind('/').map_or(0, |i| i + 1);
    match id[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => &id[..segment_start + dot],
        _ => id,
    }
}

/// Ensure an extension carries its leading dot.
pub fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

/// Append the skip query so a fetch bypasses all transformation.
pub fn skip_url(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{SKIP_QUERY}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parse() {
        let req = Request::parse("/src/app.tsx?v=1&toad-full-skip");
        assert_eq!(req.id, "/src/app.tsx");
        assert!(req.is_skipped());

        let req = Request::parse("/src/app.tsx");
        assert_eq!(req.query, None);
        assert!(!req.is_skipped());
    }

    #[test]
    fn test_virtual_ids_are_disjoint() {
        let code = virtual_module_id("/src/app.tsx");
        let style = virtual_style_id("/src/app.tsx", ".css");
        assert_eq!(code, "/@toad/module/src/app.tsx");
        assert_eq!(style, "/@toad/style/src/app.css");
        assert!(is_virtual_module(&code) && !is_virtual_style(&code));
        assert!(is_virtual_style(&style) && !is_virtual_module(&style));
        assert!(is_virtual(&code) && is_virtual(&style));
    }

    #[test]
    fn test_real_module_id_roundtrip() {
        let code = virtual_module_id("/src/app.tsx");
        assert_eq!(real_module_id(&code).as_deref(), Some("/src/app.tsx"));
        assert_eq!(real_module_id("/src/app.tsx"), None);
    }

    #[test]
    fn test_style_extension_override() {
        assert_eq!(virtual_style_id("app.tsx", "scss"), "/@toad/style/app.scss");
        assert_eq!(virtual_style_id("app.tsx", " .scss "), "/@toad/style/app.scss");
    }

    #[test]
    fn test_skip_url() {
        assert_eq!(skip_url("/a.tsx"), "/a.tsx?toad-full-skip");
        assert_eq!(skip_url("/a.tsx?v=2"), "/a.tsx?v=2&toad-full-skip");
    }
}
