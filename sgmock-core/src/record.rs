//! Stored records

use crate::{EntityId, EntityRef, FieldMap, Value};

/// One stored entity: its type, store-assigned id, validated field values,
/// and soft-delete flag.
///
/// `fields` only ever contains keys defined on the entity type's schema;
/// unknown fields are rejected at mutation time. A record is never
/// physically erased through the public surface; `delete` tombstones it and
/// `revive` brings it back.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity_type: String,
    pub id: EntityId,
    pub fields: FieldMap,
    pub deleted: bool,
}

impl Record {
    pub fn new(entity_type: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
            fields: FieldMap::new(),
            deleted: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.id)
    }

    /// Value of a single-segment field path, with the `id` and `type`
    /// built-ins materialized on the fly.
    pub fn resolve(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::Number(self.id)),
            "type" => Some(Value::Text(self.entity_type.clone())),
            _ => self.fields.get(field).cloned(),
        }
    }

    /// Best-effort display name, the way the real service labels linked
    /// entities: the first of `code`, `name`, `title`, `content` that holds
    /// text.
    pub fn display_name(&self) -> Option<&str> {
        for field in ["code", "name", "title", "content"] {
            if let Some(Value::Text(s)) = self.fields.get(field) {
                return Some(s);
            }
        }
        None
    }
}

/// A wire-shaped query result row: requested fields rendered to JSON, plus
/// the `id` and `type` keys that every result carries.
pub type ProjectedRecord = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// TESTS
// =============================================================================
