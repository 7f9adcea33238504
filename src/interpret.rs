//! Response interpretation: pull a JSON object out of free-form model text.
//!
//! Even when asked for "JSON only", vision models wrap their answer in
//! ` ```json ` fences, prepend a sentence, or append a remark. This module
//! strips the fences and takes the widest `{ … }` span in what remains.
//! Not finding one is a normal outcome, reported as `None`: callers fall
//! back to the raw text or to the rule-based extractor.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Opening (language-tagged or bare) and closing fence markers.
static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").unwrap());

/// Greedy span from the first `{` to the last `}`.
static RE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Extract the structured JSON payload from a model response.
///
/// Returns `None` when the text has no brace span or the span is not valid
/// JSON.
pub fn extract_structured(raw: &str) -> Option<Value> {
    let stripped = strip_fences(raw);
    let span = RE_OBJECT.find(stripped.trim())?;
    match serde_json::from_str(span.as_str()) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Brace span is not valid JSON: {}", e);
            None
        }
    }
}

/// Like [`extract_structured`], then deserialise into `T`.
pub fn extract_as<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let value = extract_structured(raw)?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Structured response does not match target shape: {}", e);
            None
        }
    }
}

fn strip_fences(input: &str) -> String {
    RE_FENCE.replace_all(input, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json() {
        assert_eq!(extract_structured("```json\n{\"a\":1}\n```"), Some(json!({"a": 1})));
    }

    #[test]
    fn bare_fence() {
        assert_eq!(extract_structured("```\n{\"a\":1}\n```"), Some(json!({"a": 1})));
    }

    #[test]
    fn no_json_is_none() {
        assert_eq!(extract_structured("no json here"), None);
        assert_eq!(extract_structured(""), None);
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let raw = "Sure! Here is the edit:\n{\"action\": \"crop\", \"parameters\": {\"aspectRatio\": \"1:1\"}}\nLet me know.";
        let v = extract_structured(raw).unwrap();
        assert_eq!(v["action"], "crop");
    }

    #[test]
    fn nested_objects_use_outermost_span() {
        let v = extract_structured("{\"a\": {\"b\": {\"c\": 2}}}").unwrap();
        assert_eq!(v["a"]["b"]["c"], 2);
    }

    #[test]
    fn greedy_span_across_two_objects_fails_to_parse() {
        // First `{` to last `}` covers both objects, which is not one JSON value.
        assert_eq!(extract_structured("{\"a\":1} and {\"b\":2}"), None);
    }

    #[test]
    fn malformed_json_is_none() {
        assert_eq!(extract_structured("{action: crop}"), None);
    }

    #[test]
    fn extract_as_typed() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct A {
            a: u32,
        }
        assert_eq!(extract_as::<A>("```json\n{\"a\":7}\n```"), Some(A { a: 7 }));
        assert_eq!(extract_as::<A>("{\"b\":7}"), None);
    }
}
