//! Mutation engine
//!
//! Validated create / update plus the soft-delete state machine:
//! `Active --delete--> Deleted --revive--> Active`. Every write is checked
//! against the schema before the store is touched, so a failed validation
//! never leaves a partial record behind.

use crate::store::EntityStore;
use sgmock_core::{
    EntityId, FieldMap, Record, SchemaModel, ShotgridResult, StorageError, ValidationError, Value,
};
use tracing::debug;

pub struct MutationEngine<'a> {
    schema: &'a SchemaModel,
    store: &'a EntityStore,
}

impl<'a> MutationEngine<'a> {
    pub fn new(schema: &'a SchemaModel, store: &'a EntityStore) -> Self {
        Self { schema, store }
    }

    /// Create a record from wire data.
    ///
    /// Every key must name a schema field; `id` and `type` are assigned by
    /// the store and rejected in data. Fields left unset receive the schema
    /// default, if one is defined.
    pub fn create(
        &self,
        entity_type: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> ShotgridResult<Record> {
        let type_def = self.schema.entity_type(entity_type)?;
        let mut fields = self.validate_data(entity_type, data)?;

        for (name, def) in &type_def.fields {
            if name == "id" || name == "type" {
                continue;
            }
            if let Some(default) = &def.default_value {
                fields.entry(name.clone()).or_insert_with(|| default.clone());
            }
        }

        let mut record = Record::new(entity_type, self.store.allocate_id(entity_type));
        record.fields = fields;
        self.store.insert(record.clone())?;
        debug!(entity_type, id = record.id, "created entity");
        Ok(record)
    }

    /// Merge validated `data` into an existing record. Unspecified fields
    /// are left alone; an explicit null unsets a field. Tombstoned records
    /// are not found.
    pub fn update(
        &self,
        entity_type: &str,
        id: EntityId,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> ShotgridResult<Record> {
        self.schema.entity_type(entity_type)?;
        let validated = self.validate_update_data(entity_type, data)?;

        let updated = self.store.modify(entity_type, id, |record| {
            if record.deleted {
                return None;
            }
            for (name, value) in validated {
                match value {
                    Some(value) => {
                        record.fields.insert(name, value);
                    }
                    None => {
                        record.fields.remove(&name);
                    }
                }
            }
            Some(record.clone())
        });
        match updated.flatten() {
            Some(record) => {
                debug!(entity_type, id, "updated entity");
                Ok(record)
            }
            None => Err(StorageError::NotFound {
                entity_type: entity_type.to_string(),
                id,
            }
            .into()),
        }
    }

    /// Tombstone a record. `Ok(true)` on the first delete, `Ok(false)` when
    /// it is already deleted; unknown ids are an error.
    pub fn delete(&self, entity_type: &str, id: EntityId) -> ShotgridResult<bool> {
        self.schema.entity_type(entity_type)?;
        let flipped = self.store.modify(entity_type, id, |record| {
            if record.deleted {
                false
            } else {
                record.deleted = true;
                true
            }
        });
        match flipped {
            Some(flipped) => {
                if flipped {
                    debug!(entity_type, id, "deleted entity");
                }
                Ok(flipped)
            }
            None => Err(StorageError::NotFound {
                entity_type: entity_type.to_string(),
                id,
            }
            .into()),
        }
    }

    /// Clear a tombstone. Never an error: `Ok(false)` when the record does
    /// not exist or is not deleted.
    pub fn revive(&self, entity_type: &str, id: EntityId) -> ShotgridResult<bool> {
        self.schema.entity_type(entity_type)?;
        let flipped = self
            .store
            .modify(entity_type, id, |record| {
                if record.deleted {
                    record.deleted = false;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if flipped {
            debug!(entity_type, id, "revived entity");
        }
        Ok(flipped)
    }

    /// Validate create data: reserved keys rejected, unknown fields
    /// rejected, values coerced by field data type. Nulls are dropped; an
    /// unset field simply stays unset on create.
    fn validate_data(
        &self,
        entity_type: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> ShotgridResult<FieldMap> {
        let mut fields = FieldMap::new();
        for (name, value) in self.validate_update_data(entity_type, data)? {
            if let Some(value) = value {
                fields.insert(name, value);
            }
        }
        Ok(fields)
    }

    /// Shared validation pass. Keeps the null-ness of each value so update
    /// can distinguish "unset this field" from "leave it alone".
    fn validate_update_data(
        &self,
        entity_type: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> ShotgridResult<Vec<(String, Option<Value>)>> {
        let mut validated = Vec::with_capacity(data.len());
        for (name, raw) in data {
            if name == "id" || name == "type" {
                return Err(ValidationError::ReservedField {
                    field: name.clone(),
                }
                .into());
            }
            let def = self.schema.field_def(entity_type, name)?;
            let value = Value::coerce(entity_type, name, def, raw)?;
            validated.push((name.clone(), value));
        }
        Ok(validated)
    }
}

// =============================================================================
// TESTS
// =============================================================================
