use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::error::{ExtractError, Result};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)\s*```").expect("code fence pattern is valid")
});

/// Strip the decoration models wrap around structured output: surrounding
/// whitespace and markdown code fences.
pub fn strip_decoration(reply: &str) -> &str {
    match CODE_FENCE.captures(reply).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => reply.trim(),
    }
}

/// Parse a reply that should hold a JSON array of records.
///
/// Accepts a bare array, an array embedded in prose, an object wrapping the
/// array (`entities` or any single array-valued key), or one lone record
/// carrying a `name`.
pub fn parse_json_array(reply: &str, unit: &str) -> Result<Vec<Value>> {
    let body = strip_decoration(reply);

    let value = parse_value(body)
        .or_else(|| delimited(body, '[', ']').and_then(parse_value))
        .ok_or_else(|| ExtractError::parse(unit, format!("not valid JSON: {}", preview(body))))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => unwrap_object(map)
            .ok_or_else(|| ExtractError::parse(unit, "expected a JSON array")),
        other => Err(ExtractError::parse(
            unit,
            format!("expected a JSON array, got {}", preview(&other.to_string())),
        )),
    }
}

/// Parse a reply that should hold a single JSON object.
pub fn parse_json_object(reply: &str, unit: &str) -> Result<Map<String, Value>> {
    let body = strip_decoration(reply);

    let value = parse_value(body)
        .or_else(|| delimited(body, '{', '}').and_then(parse_value))
        .ok_or_else(|| ExtractError::parse(unit, format!("not valid JSON: {}", preview(body))))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ExtractError::parse(
            unit,
            format!("expected a JSON object, got {}", preview(&other.to_string())),
        )),
    }
}

fn unwrap_object(mut map: Map<String, Value>) -> Option<Vec<Value>> {
    if let Some(Value::Array(items)) = map.remove("entities") {
        return Some(items);
    }
    if map.contains_key("name") {
        return Some(vec![Value::Object(map)]);
    }

    let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
        Value::Array(items) => Some(items),
        _ => None,
    });
    match (arrays.next(), arrays.next()) {
        (Some(items), None) => Some(items),
        _ => None,
    }
}

fn parse_value(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_decoration("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_decoration("  [1]  \n"), "[1]");
    }

    #[test]
    fn test_array_with_decoration() {
        let reply = "Here are the entities:\n```json\n[{\"name\": \"小明\", \"type\": \"人物\"}]\n```";
        let items = parse_json_array(reply, "chunk 0").unwrap();
        assert_eq!(items, vec![json!({"name": "小明", "type": "人物"})]);
    }

    #[test]
    fn test_array_embedded_in_prose() {
        let items = parse_json_array("结果如下: [{\"name\": \"北京\"}] 完成", "chunk 0").unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_wrapped_entities_object() {
        let reply = r#"{"entities": [{"name": "a"}, {"name": "b"}]}"#;
        let items = parse_json_array(reply, "c").unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_lone_record_becomes_one_item() {
        let reply = r#"{"name": "小明", "type": "人物", "attributes": {"地点": "北京"}}"#;
        let items = parse_json_array(reply, "chunk 0").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["attributes"]["地点"], json!("北京"));
    }

    #[test]
    fn test_other_wrapper_key() {
        let items = parse_json_array(r#"{"result": [{"name": "a"}, {"name": "b"}]}"#, "c").unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_ambiguous_object_is_a_parse_error() {
        assert!(parse_json_array(r#"{"a": [1], "b": [2]}"#, "c").is_err());
        assert!(parse_json_array(r#"{"count": 3}"#, "c").is_err());
    }

    #[test]
    fn test_broken_array_is_a_parse_error() {
        let err = parse_json_array("[{\"name\": \"小明\"", "chunk 2").unwrap_err();
        assert!(matches!(err, ExtractError::ExtractionParse { ref unit, .. } if unit == "chunk 2"));
    }

    #[test]
    fn test_object_parsing() {
        let reply = "```\n{\"conflict\": true, \"reason\": \"x\"}\n```";
        let map = parse_json_object(reply, "e").unwrap();
        assert_eq!(map["conflict"], json!(true));

        assert!(parse_json_object("[1, 2]", "e").is_err());
        assert!(parse_json_object("no json here", "e").is_err());
    }
}
