use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ExtractError, Result};

/// Canonical record for one real-world entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub events: Vec<Value>,
    #[serde(default)]
    pub relations: Vec<Value>,
}

impl EntityRecord {
    /// New record with a freshly assigned id.
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            entity_id: Uuid::new_v4(),
            name: name.into(),
            entity_type: entity_type.into(),
            attributes: Map::new(),
            events: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_event(mut self, event: Value) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_relation(mut self, relation: Value) -> Self {
        self.relations.push(relation);
        self
    }

    /// Build a record from one entity-shaped value of a model reply.
    ///
    /// `name` and `type` must be non-empty strings; `attributes` must be an
    /// object and `events`/`relations` arrays of objects when present. Any
    /// `entity_id` in the payload is ignored and a fresh one is assigned.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ExtractError::Validation(format!("expected object, got {value}")))?;

        let name = required_string(object, "name")?;
        let entity_type = required_string(object, "type")?;

        let attributes = match object.get("attributes") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(ExtractError::Validation(format!(
                    "entity '{name}': attributes must be an object, got {other}"
                )));
            }
        };

        let events = record_list(object, "events", &name)?;
        let relations = record_list(object, "relations", &name)?;

        Ok(Self {
            entity_id: Uuid::new_v4(),
            name,
            entity_type,
            attributes,
            events,
            relations,
        })
    }
}

fn required_string(object: &Map<String, Value>, field: &str) -> Result<String> {
    match object.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(other) => Err(ExtractError::Validation(format!(
            "field '{field}' must be a non-empty string, got {other}"
        ))),
        None => Err(ExtractError::Validation(format!("missing field '{field}'"))),
    }
}

fn record_list(object: &Map<String, Value>, field: &str, name: &str) -> Result<Vec<Value>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            if let Some(bad) = items.iter().find(|item| !item.is_object()) {
                return Err(ExtractError::Validation(format!(
                    "entity '{name}': {field} entries must be objects, got {bad}"
                )));
            }
            Ok(items.clone())
        }
        Some(other) => Err(ExtractError::Validation(format!(
            "entity '{name}': {field} must be an array, got {other}"
        ))),
    }
}

/// Conflict assessment for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    pub entity_id: Uuid,
    pub entity_name: String,
    pub conflict: bool,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConsistencyResult {
    /// Placeholder recorded when the assessment could not be obtained.
    pub fn failed(entity: &EntityRecord, error: impl Into<String>) -> Self {
        Self {
            entity_id: entity.entity_id,
            entity_name: entity.name.clone(),
            conflict: false,
            details: Map::new(),
            error: Some(error.into()),
        }
    }
}

/// Rewritten text for one chunk, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectedChunk {
    pub index: usize,
    /// Stable id of the source chunk (see `ingest::Chunk`)
    pub chunk_id: String,
    /// `[start, end)` character range of the source chunk
    pub offset: (usize, usize),
    pub original_text: String,
    pub corrected_text: String,
}

/// Grammar verdict for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarResult {
    pub index: usize,
    /// `None` when the verdict could not be parsed.
    pub correct: Option<bool>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reason: String,
    pub original_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_assigns_fresh_id() {
        let raw = json!({"entity_id": "from-llm", "name": "小明", "type": "人物"});
        let a = EntityRecord::from_value(&raw).unwrap();
        let b = EntityRecord::from_value(&raw).unwrap();
        assert_ne!(a.entity_id, b.entity_id);
        assert_eq!(a.name, "小明");
        assert_eq!(a.entity_type, "人物");
        assert!(a.attributes.is_empty());
    }

    #[test]
    fn test_from_value_keeps_open_attributes() {
        let raw = json!({
            "name": "小明",
            "type": "人物",
            "attributes": {"地点": "北京", "年龄": 30},
            "events": [{"时间": "2021", "动作": "入职"}],
            "relations": [{"关系": "同事", "目标实体": "小红"}]
        });
        let entity = EntityRecord::from_value(&raw).unwrap();
        assert_eq!(entity.attributes["年龄"], json!(30));
        assert_eq!(entity.events.len(), 1);
        assert_eq!(entity.relations[0]["目标实体"], json!("小红"));
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let err = EntityRecord::from_value(&json!({"type": "人物"})).unwrap_err();
        assert!(matches!(err, ExtractError::Validation(_)));

        let err = EntityRecord::from_value(&json!({"name": "  ", "type": "人物"})).unwrap_err();
        assert!(matches!(err, ExtractError::Validation(_)));
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let err = EntityRecord::from_value(&json!({"name": "小明"})).unwrap_err();
        assert!(err.to_string().contains("type"));
    }

    #[test]
    fn test_malformed_collections_are_rejected() {
        let bad_attrs = json!({"name": "a", "type": "b", "attributes": ["x"]});
        assert!(EntityRecord::from_value(&bad_attrs).is_err());

        let bad_events = json!({"name": "a", "type": "b", "events": ["just text"]});
        assert!(EntityRecord::from_value(&bad_events).is_err());
    }

    #[test]
    fn test_entity_serializes_type_field() {
        let entity = EntityRecord::new("小明", "人物").with_attribute("地点", "北京");
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["type"], json!("人物"));
        assert_eq!(value["attributes"]["地点"], json!("北京"));

        let back: EntityRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, entity);
    }
}
