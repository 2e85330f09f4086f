//! Extracted style template occurrences.

use serde::{Deserialize, Serialize};

/// One extracted style template.
///
/// Field names follow the camelCase shape of the server export so the
/// evaluated list deserializes straight into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleEntry {
    /// Generated class name, stable across client and server passes.
    pub identifier: String,
    /// Template text between the backticks, trimmed, interpolations intact.
    pub raw_template: String,
    /// Emitted verbatim instead of wrapped in a class selector.
    #[serde(default)]
    pub is_global: bool,
}

impl StyleEntry {
    pub fn new(identifier: impl Into<String>, raw_template: impl Into<String>, is_global: bool) -> Self {
        Self {
            identifier: identifier.into(),
            raw_template: raw_template.into(),
            is_global,
        }
    }

    /// Whether any `${...}` interpolation remains in the template.
    pub fn has_interpolations(&self) -> bool {
        self.raw_template.contains("${")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_export_shape() {
        let json = r#"{"identifier":"app-1a2b3c4d","rawTemplate":"color: red;","isGlobal":false}"#;
        let entry: StyleEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry, StyleEntry::new("app-1a2b3c4d", "color: red;", false));
    }

    #[test]
    fn test_is_global_defaults_to_false() {
        let json = r#"{"identifier":"x","rawTemplate":"a: b;"}"#;
        let entry: StyleEntry = serde_json::from_str(json).unwrap();
        assert!(!entry.is_global);
    }

    #[test]
    fn test_has_interpolations() {
        assert!(StyleEntry::new("x", "color: ${c};", false).has_interpolations());
        assert!(!StyleEntry::new("x", "color: red;", false).has_interpolations());
    }
}
