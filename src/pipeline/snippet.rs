//! Client code appended to transformed modules in serve mode.
//!
//! On load, the client reports `(virtualCodeId, contentHash)` over the hot
//! channel so the server can tell whether the stylesheet it was served is
//! stale. Top-level loads (no query) wait briefly for a resulting update.

use crate::extract::js_string;
use crate::reload::message::WS_EVENT;

/// Delay, in milliseconds, a top-level module waits after reporting.
const SETTLE_MS: u32 = 300;

pub(super) fn hmr_snippet(virtual_code_id: &str, hash: &str) -> String {
    let event = js_string(WS_EVENT);
    format!(
        r#"
if (import.meta.hot) {{
  try {{ await import.meta.hot.send({event}, [{id}, {hash}]); }}
  catch (e) {{ console.warn({event}, e) }}
  if (!import.meta.url.includes("?")) await new Promise(resolve => setTimeout(resolve, {SETTLE_MS}))
}}
"#,
        id = js_string(virtual_code_id),
        hash = js_string(hash),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_reports_module_and_hash() {
        let snippet = hmr_snippet("/@toad/module/src/app.tsx", "0123abcd");
        assert!(snippet.contains(r#"["/@toad/module/src/app.tsx", "0123abcd"]"#));
        assert!(snippet.contains(r#"send("@toad:hmr""#));
        assert!(snippet.contains("setTimeout(resolve, 300)"));
    }
}
