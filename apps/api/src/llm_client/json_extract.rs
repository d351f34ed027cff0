//! Best-effort extraction of one JSON value from free-form model output.
//!
//! Grammar handled: the whole text as JSON, or the first balanced `{...}` /
//! `[...]` span that parses. Brackets inside string literals are ignored.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Returns the JSON value embedded in `text`, or `None` when nothing parses.
pub fn parse_json_response(text: &str) -> Option<Value> {
    let trimmed = strip_json_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let bytes = trimmed.as_bytes();
    let mut start = 0;
    while let Some(offset) = bytes[start..].iter().position(|b| *b == b'{' || *b == b'[') {
        let open = start + offset;
        if let Some(close) = balanced_end(bytes, open) {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[open..=close]) {
                return Some(value);
            }
        }
        start = open + 1;
    }
    None
}

/// Typed variant of [`parse_json_response`]. `None` if extraction or the shape check fails.
pub fn parse_json_as<T: DeserializeOwned>(text: &str) -> Option<T> {
    parse_json_response(text).and_then(|value| serde_json::from_value(value).ok())
}

/// Index of the bracket closing the one at `open`, tracking nesting and string literals.
fn balanced_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_object_embedded_in_prose() {
        let text = r#"Sure! Here's your data: {"a":1} Hope that helps!"#;
        assert_eq!(parse_json_response(text), Some(json!({"a": 1})));
    }

    #[test]
    fn test_plain_prose_is_none() {
        assert_eq!(parse_json_response("not json at all"), None);
    }

    #[test]
    fn test_strict_parse_first() {
        assert_eq!(parse_json_response("[1, 2, 3]"), Some(json!([1, 2, 3])));
        assert_eq!(parse_json_response("  42 "), Some(json!(42)));
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let text = r#"Result: {"text": "use } and ] freely", "n": [1, {"x": "{"}]} done"#;
        assert_eq!(
            parse_json_response(text),
            Some(json!({"text": "use } and ] freely", "n": [1, {"x": "{"}]}))
        );
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let text = r#"ok {"quote": "she said \"hi {\""} end"#;
        assert_eq!(
            parse_json_response(text),
            Some(json!({"quote": "she said \"hi {\""}))
        );
    }

    #[test]
    fn test_skips_unparseable_span_and_finds_next() {
        let text = r#"Pick {one} of these: [{"goal": "Read"}]"#;
        assert_eq!(parse_json_response(text), Some(json!([{"goal": "Read"}])));
    }

    #[test]
    fn test_unbalanced_is_none() {
        assert_eq!(parse_json_response(r#"{"a": [1, 2}"#), None);
        assert_eq!(parse_json_response(r#"here {"a": 1"#), None);
    }

    #[test]
    fn test_fenced_json() {
        let text = "```json\n{\"subtasks\": []}\n```";
        assert_eq!(parse_json_response(text), Some(json!({"subtasks": []})));
    }

    #[test]
    fn test_typed_parse_rejects_wrong_shape() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Check {
            is_vague: bool,
        }
        assert_eq!(
            parse_json_as::<Check>(r#"Answer: {"is_vague": true}"#),
            Some(Check { is_vague: true })
        );
        assert_eq!(parse_json_as::<Check>(r#"{"vague": "maybe"}"#), None);
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }
}
