//! Hot Update Message Protocol
//!
//! JSON payloads exchanged over the notification channel, in the shape
//! dev-server clients already understand.
//!
//! # Message Types
//!
//! - `connected`: handshake after a client connects
//! - `update`: re-fetch the listed modules
//! - `full-reload`: reload the page
//! - `custom`: named event; clients report `@toad:hmr` with
//!   `[virtualCodeId, contentHash]`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name of the client hash report.
pub const WS_EVENT: &str = "@toad:hmr";

/// Message sent over the notification channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HotMessage {
    /// Connection established
    Connected,

    /// Modules to re-fetch
    Update { updates: Vec<Update> },

    /// Full page reload
    FullReload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Named custom event with arbitrary payload
    Custom {
        event: String,
        #[serde(default)]
        data: Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    JsUpdate,
    CssUpdate,
}

/// One module to re-fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub path: String,
    pub accepted_path: String,
    /// Milliseconds since the epoch, used by clients as a cache buster.
    pub timestamp: u64,
}

impl HotMessage {
    /// Create an update message re-fetching `paths` as JS modules.
    pub fn js_update<I, S>(paths: I, timestamp: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::update(UpdateKind::JsUpdate, paths, timestamp)
    }

    /// Create an update message re-fetching `paths` as stylesheets.
    pub fn css_update<I, S>(paths: I, timestamp: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::update(UpdateKind::CssUpdate, paths, timestamp)
    }

    fn update<I, S>(kind: UpdateKind, paths: I, timestamp: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Update {
            updates: paths
                .into_iter()
                .map(|path| {
                    let path = path.into();
                    Update {
                        kind,
                        accepted_path: path.clone(),
                        path,
                        timestamp,
                    }
                })
                .collect(),
        }
    }

    pub fn full_reload() -> Self {
        Self::FullReload { path: None }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"full-reload"}"#.to_string())
    }

    /// Parse from JSON string
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

/// `(virtualCodeId, contentHash)` reported by a running client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHashReport {
    pub id: String,
    pub hash: String,
}

impl ClientHashReport {
    /// Extract a report from a `custom` message carrying [`WS_EVENT`].
    pub fn from_message(message: &HotMessage) -> Option<Self> {
        let HotMessage::Custom { event, data } = message else {
            return None;
        };
        if event != WS_EVENT {
            return None;
        }
        let (id, hash) = serde_json::from_value::<(String, String)>(data.clone()).ok()?;
        Some(Self { id, hash })
    }

    /// Parse a raw channel frame.
    pub fn from_json(s: &str) -> Option<Self> {
        Self::from_message(&HotMessage::from_json(s)?)
    }
}

/// Current time in milliseconds since the epoch.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_serialization() {
        let msg = HotMessage::js_update(["/src/app.tsx"], 42);
        let json = msg.to_json();
        assert_eq!(
            json,
            r#"{"type":"update","updates":[{"type":"js-update","path":"/src/app.tsx","acceptedPath":"/src/app.tsx","timestamp":42}]}"#
        );
        assert_eq!(HotMessage::from_json(&json), Some(msg));
    }

    #[test]
    fn test_css_update_kind() {
        let HotMessage::Update { updates } = HotMessage::css_update(["/@toad/style/a.css"], 1) else {
            panic!("expected update");
        };
        assert_eq!(updates[0].kind, UpdateKind::CssUpdate);
        assert!(HotMessage::css_update(["/a.css"], 1).to_json().contains(r#""type":"css-update""#));
    }

    #[test]
    fn test_full_reload_and_connected() {
        assert_eq!(HotMessage::full_reload().to_json(), r#"{"type":"full-reload"}"#);
        assert_eq!(HotMessage::Connected.to_json(), r#"{"type":"connected"}"#);
    }

    #[test]
    fn test_client_report_parse() {
        let frame = r#"{"type":"custom","event":"@toad:hmr","data":["/@toad/module/src/app.tsx","abcd"]}"#;
        let report = ClientHashReport::from_json(frame).unwrap();
        assert_eq!(report.id, "/@toad/module/src/app.tsx");
        assert_eq!(report.hash, "abcd");
    }

    #[test]
    fn test_client_report_rejects_other_frames() {
        assert!(ClientHashReport::from_json(r#"{"type":"custom","event":"other","data":["a","b"]}"#).is_none());
        assert!(ClientHashReport::from_json(r#"{"type":"custom","event":"@toad:hmr","data":"x"}"#).is_none());
        assert!(ClientHashReport::from_json("not json").is_none());
    }
}
