//! Best-effort JSON extraction from model replies

use serde_json::{Value, json};
use tracing::warn;

/// Longest excerpt of an unparseable reply echoed back to the caller
pub const RAW_EXCERPT_LIMIT: usize = 500;

/// Error message used when a reply is not valid JSON
pub const PARSE_FAILURE: &str = "Failed to parse response";

/// Strip Markdown code-fence wrapping from a model reply.
///
/// A block opened with ```` ```json ```` wins; otherwise the first fenced
/// block is used. Text without fences is returned unchanged.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    if let Some((_, rest)) = raw.split_once("```json") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else if raw.contains("```") {
        raw.split("```").nth(1).unwrap_or(raw).trim()
    } else {
        raw
    }
}

/// Parse a model reply into JSON, never failing.
///
/// Unparseable text becomes `{"error": ..., "raw": <first 500 chars>}`.
#[must_use]
pub fn parse_reply(raw: &str) -> Value {
    let body = strip_code_fence(raw);
    match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, len = body.len(), "Model reply is not valid JSON");
            json!({
                "error": PARSE_FAILURE,
                "raw": excerpt(body, RAW_EXCERPT_LIMIT),
            })
        }
    }
}

/// First `limit` characters of `text`
fn excerpt(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_tagged_fence_is_preferred() {
        let raw = "Here you go:\n```\nnot this\n```\n```json\n{\"a\": 1}\n```";
        // The first fence is untagged, but the tagged block still wins.
        assert_eq!(strip_code_fence(raw), "{\"a\": 1}");
    }

    #[test]
    fn untagged_fence_is_unwrapped() {
        let raw = "```\n[1, 2, 3]\n```\ntrailing words";
        assert_eq!(strip_code_fence(raw), "[1, 2, 3]");
    }

    #[test]
    fn unfenced_text_is_untouched() {
        assert_eq!(strip_code_fence("  {\"x\": true} "), "  {\"x\": true} ");
    }

    #[test]
    fn fenced_reply_parses_to_inner_object() {
        let raw = "```json\n{\"logs\": [{\"level\": \"error\", \"service\": \"checkout-service\"}]}\n```";
        assert_eq!(
            parse_reply(raw),
            json!({"logs": [{"level": "error", "service": "checkout-service"}]})
        );
    }

    #[test]
    fn plain_json_reply_parses() {
        assert_eq!(parse_reply("{\"ok\": true}\n"), json!({"ok": true}));
    }

    #[test]
    fn prose_reply_becomes_error_object() {
        let value = parse_reply("Sorry, I cannot help with that.");
        assert_eq!(value["error"], PARSE_FAILURE);
        assert_eq!(value["raw"], "Sorry, I cannot help with that.");
    }

    #[test]
    fn raw_excerpt_is_capped_at_500_chars() {
        let long = "é".repeat(1200);
        let value = parse_reply(&long);
        let raw = value["raw"].as_str().unwrap();
        assert_eq!(raw.chars().count(), RAW_EXCERPT_LIMIT);
    }

    #[test]
    fn unterminated_fence_keeps_remaining_text() {
        let raw = "```json\n{\"partial\": 1}";
        assert_eq!(parse_reply(raw), json!({"partial": 1}));
    }
}
