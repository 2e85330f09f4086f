//! Generated export of the server-rendering pass.
//!
//! The server variant of a module ends with
//!
//! ```js
//! export const __TOAD__ = { entries: [
//!   { identifier: String.raw`app-1a2b3c4d`, rawTemplate: String.raw`color: ${fg};`, isGlobal: false },
//! ] }
//! ```
//!
//! String fields are template literals, so `${...}` spans are evaluated by
//! the runtime while multi-line text and backslashes survive as written.

use serde_json::Value;
use thiserror::Error;

use crate::entry::StyleEntry;

/// Name of the export carrying evaluated entries.
pub const EXPORT_NAME: &str = "__TOAD__";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("module has no `__TOAD__` export")]
    Missing,

    #[error("malformed `__TOAD__` export: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Append the entry export to server code.
pub fn append_export(code: &str, entries: &[StyleEntry]) -> String {
    let mut out = String::with_capacity(code.len() + 64 * (entries.len() + 1));
    out.push_str(code);
    out.push_str("\nexport const ");
    out.push_str(EXPORT_NAME);
    out.push_str(" = { entries: [");
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str("\n  { identifier: ");
        out.push_str(&raw_literal(&entry.identifier));
        out.push_str(", rawTemplate: ");
        out.push_str(&raw_literal(&entry.raw_template));
        out.push_str(", isGlobal: ");
        out.push_str(if entry.is_global { "true" } else { "false" });
        out.push_str(" }");
    }
    if !entries.is_empty() {
        out.push('\n');
    }
    out.push_str("] };\n");
    out
}

/// Template body as written in source is already valid template text.
fn raw_literal(text: &str) -> String {
    format!("String.raw`{text}`")
}

/// Read entries from an evaluated module namespace.
///
/// Accepts either the namespace object or the export value itself.
pub fn read_entries(module: &Value) -> Result<Vec<StyleEntry>, ExportError> {
    let export = module.get(EXPORT_NAME).unwrap_or(module);
    let entries = export.get("entries").ok_or(ExportError::Missing)?;
    Ok(serde_json::from_value(entries.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_export_shape() {
        let entries = [
            StyleEntry::new("app-1", "color: ${fg};\n  margin: 0;", false),
            StyleEntry::new("app-global-2", "/*global*/ body {}", true),
        ];
        let code = append_export("const fg = 'red';", &entries);
        assert!(code.starts_with("const fg = 'red';\nexport const __TOAD__ = { entries: ["));
        assert!(code.contains("rawTemplate: String.raw`color: ${fg};\n  margin: 0;`"));
        assert!(code.contains("identifier: String.raw`app-global-2`"));
        assert!(code.contains("isGlobal: true"));
        assert!(code.ends_with("] };\n"));
    }

    #[test]
    fn test_append_export_empty() {
        assert_eq!(
            append_export("", &[]),
            "\nexport const __TOAD__ = { entries: [] };\n"
        );
    }

    #[test]
    fn test_read_entries_from_namespace() {
        let namespace = json!({
            "default": null,
            "__TOAD__": { "entries": [
                { "identifier": "app-1", "rawTemplate": "color: red;", "isGlobal": false }
            ] }
        });
        let entries = read_entries(&namespace).unwrap();
        assert_eq!(entries, [StyleEntry::new("app-1", "color: red;", false)]);
    }

    #[test]
    fn test_read_entries_errors() {
        assert!(matches!(read_entries(&json!({})), Err(ExportError::Missing)));
        assert!(matches!(
            read_entries(&json!({ "entries": [{ "identifier": 1 }] })),
            Err(ExportError::Malformed(_))
        ));
    }
}
