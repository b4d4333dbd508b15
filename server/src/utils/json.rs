//! JSON utility functions

use serde_json::{Deserializer, Map, Value as JsonValue};

/// Locate the JSON object inside free-form model output.
///
/// Returns the first complete object, starting from the earliest `{` that
/// opens one, so code fences and prose on either side are dropped even when
/// that prose contains braces. When no complete object parses, the span from
/// the first `{` to the last `}` is returned for the strict parser to reject.
/// Returns `None` when the text holds no braces at all.
///
/// # Example
///
/// ```
/// use queryscope_server::utils::json::extract_json_object;
///
/// let text = "Final Answer (JSON):\n```json\n{\"a\": 1}\n```";
/// assert_eq!(extract_json_object(text), Some("{\"a\": 1}"));
/// ```
pub fn extract_json_object(text: &str) -> Option<&str> {
    for (start, _) in text.match_indices('{') {
        let mut values = Deserializer::from_str(&text[start..]).into_iter::<JsonValue>();
        if let Some(Ok(_)) = values.next() {
            return Some(&text[start..start + values.byte_offset()]);
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Borrow a string field from a JSON object
pub fn str_field<'a>(value: &'a JsonValue, key: &str) -> Option<&'a str> {
    value.get(key).and_then(JsonValue::as_str)
}

/// Build a JSON object from key/value pairs, skipping null values
pub fn object_from_pairs<I>(pairs: I) -> Map<String, JsonValue>
where
    I: IntoIterator<Item = (&'static str, JsonValue)>,
{
    pairs
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_fenced_object() {
        let text = "```json\n{\"severity\": \"high\"}\n```";
        assert_eq!(extract_json_object(text), Some("{\"severity\": \"high\"}"));
    }

    #[test]
    fn test_prose_around_object() {
        let text = "Thought: done\nFinal Answer (JSON):\n{\"x\": {\"y\": 2}}\nThanks";
        assert_eq!(extract_json_object(text), Some("{\"x\": {\"y\": 2}}"));
    }

    #[test]
    fn test_trailing_prose_with_braces() {
        let text = "Final Answer (JSON):\n{\"a\": {\"b\": 1}}\nNote: cost_drivers use {metric: value} form.";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_leading_prose_with_braces() {
        let text = "Shape is {severity, issues}.\n```json\n{\"severity\": \"low\"}\n```";
        assert_eq!(extract_json_object(text), Some("{\"severity\": \"low\"}"));
    }

    #[test]
    fn test_malformed_object_left_for_parser() {
        let text = "answer: {\"a\": 1,}";
        assert_eq!(extract_json_object(text), Some("{\"a\": 1,}"));
    }

    #[test]
    fn test_no_object() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_str_field() {
        let value = json!({"name": "XL_WH", "n": 1});
        assert_eq!(str_field(&value, "name"), Some("XL_WH"));
        assert_eq!(str_field(&value, "n"), None);
        assert_eq!(str_field(&value, "missing"), None);
    }

    #[test]
    fn test_object_from_pairs_skips_null() {
        let map = object_from_pairs([("a", json!(1)), ("b", JsonValue::Null)]);
        assert_eq!(map.len(), 1);
        assert_eq!(map["a"], 1);
    }
}
