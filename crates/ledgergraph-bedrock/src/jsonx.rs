//! Resilient extraction of JSON payloads from model responses.
//!
//! Providers wrap JSON in prose or fenced code blocks, and long responses
//! sometimes truncate mid-structure. Extraction prefers fenced blocks,
//! then falls back to the first `{` or `[` with progressively trimmed
//! closing brackets. Total failure yields `None`; callers degrade to an
//! empty result set.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static FENCED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*([\s\S]+?)\s*```").expect("valid regex")
});

/// Extract the first JSON value found in `text`.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(captures) = FENCED_RE.captures(text) {
        if let Some(value) = parse_candidate(captures.get(1).map_or("", |m| m.as_str())) {
            return Some(value);
        }
    }
    parse_candidate(text)
}

/// Extract a JSON array. An object with a `relationships` array unwraps to
/// that array; any other lone object becomes a single-element array.
#[must_use]
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    match extract_json(text)? {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("relationships") {
                Some(items.clone())
            } else {
                Some(vec![Value::Object(map)])
            }
        }
        _ => None,
    }
}

/// Extract a JSON object.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    match extract_json(text)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn parse_candidate(candidate: &str) -> Option<Value> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    // Direct parse first.
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }

    // Locate the first JSON token and decode from there, tolerating
    // trailing commentary by trimming to candidate closing brackets.
    for (open, close) in [('[', ']'), ('{', '}')] {
        let Some(start) = candidate.find(open) else {
            continue;
        };
        let tail = &candidate[start..];

        // A streaming decoder stops at the end of the first value, which
        // handles trailing prose after well-formed JSON.
        let mut stream = serde_json::Deserializer::from_str(tail).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Some(value);
        }

        // Trim to successively earlier closing brackets to recover from
        // truncated output.
        let mut end = tail.len();
        while let Some(idx) = tail[..end].rfind(close) {
            if let Ok(value) = serde_json::from_str::<Value>(&tail[..=idx]) {
                return Some(value);
            }
            if idx == 0 {
                break;
            }
            end = idx;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_fenced_blocks() {
        let text = "Here are the relationships:\n```json\n[{\"edge_type\": \"OWNS\"}]\n```\nDone.";
        let items = extract_json_array(text).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["edge_type"], "OWNS");
    }

    #[test]
    fn recovers_json_with_leading_and_trailing_prose() {
        let text = "Sure. [{\"a\": 1}, {\"a\": 2}] Let me know if you need more.";
        let items = extract_json_array(text).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn unwraps_relationships_envelope() {
        let text = r#"{"relationships": [{"source_id": "x"}], "note": "ok"}"#;
        let items = extract_json_array(text).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["source_id"], "x");
    }

    #[test]
    fn recovers_first_object_from_truncated_array() {
        let text = "[{\"a\": 1}, {\"a\": 2}, {\"a\":";
        // No closing bracket survives, so recovery falls through to the
        // first complete object.
        let items = extract_json_array(text).unwrap();
        assert_eq!(items, vec![serde_json::json!({"a": 1})]);
    }

    #[test]
    fn object_extraction() {
        let text = "analysis: {\"entities\": [], \"relationships\": []}";
        let map = extract_json_object(text).unwrap();
        assert!(map.contains_key("entities"));
    }

    #[test]
    fn garbage_yields_none() {
        assert!(extract_json("no json here at all").is_none());
        assert!(extract_json("").is_none());
        assert!(extract_json_array("just words").is_none());
    }
}
