use indexmap::IndexMap;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{ExtractError, Result};
use crate::schema::EntityRecord;

/// Entity records for one document run, deduplicated by name.
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    /// entity_id -> record, in first-seen order
    entities: IndexMap<Uuid, EntityRecord>,
    /// name -> entity_id
    name_index: HashMap<String, Uuid>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity, or fold it into the record already holding its name.
    ///
    /// Returns the id of the surviving record.
    pub fn add(&mut self, entity: EntityRecord) -> Result<Uuid> {
        if entity.name.trim().is_empty() {
            return Err(ExtractError::Validation(format!(
                "entity {} has no name",
                entity.entity_id
            )));
        }

        if let Some(existing_id) = self.name_index.get(&entity.name).copied() {
            if let Some(existing) = self.entities.get_mut(&existing_id) {
                merge(existing, entity);
                return Ok(existing_id);
            }
        }

        let id = entity.entity_id;
        self.name_index.insert(entity.name.clone(), id);
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Every live record in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }

    /// Owned copy of every record, in insertion order.
    pub fn snapshot(&self) -> Vec<EntityRecord> {
        self.entities.values().cloned().collect()
    }

    pub fn get(&self, id: &Uuid) -> Option<&EntityRecord> {
        self.entities.get(id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&EntityRecord> {
        self.name_index.get(name).and_then(|id| self.entities.get(id))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn into_records(self) -> Vec<EntityRecord> {
        self.entities.into_values().collect()
    }
}

/// Incoming attributes overwrite on key collision; events and relations are
/// appended unless an equal entry is already present. Identity fields of
/// `existing` are never touched.
fn merge(existing: &mut EntityRecord, incoming: EntityRecord) {
    for (key, value) in incoming.attributes {
        existing.attributes.insert(key, value);
    }

    for event in incoming.events {
        if !existing.events.contains(&event) {
            existing.events.push(event);
        }
    }

    for relation in incoming.relations {
        if !existing.relations.contains(&relation) {
            existing.relations.push(relation);
        }
    }
}
