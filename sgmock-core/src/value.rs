//! Typed field values
//!
//! A stored value is always tagged with the shape its schema field demands.
//! Wire data arrives as loose JSON and is coerced here, driven by the target
//! field's [`DataType`](crate::DataType), never by inspecting the runtime
//! shape of the JSON itself.

use crate::schema::FieldDef;
use crate::{DataType, EntityId, Timestamp, ValidationError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reference to an entity by type name and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.entity_type, self.id)
    }
}

/// A single stored field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// text, status_list, list, color
    Text(String),
    /// number, duration, percent
    Number(i64),
    Float(f64),
    Checkbox(bool),
    Date(NaiveDate),
    DateTime(Timestamp),
    Entity(EntityRef),
    MultiEntity(Vec<EntityRef>),
    /// serializable, url, image, tag_list payloads, stored verbatim
    Json(serde_json::Value),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Linked references carried by this value: one for `entity` fields,
    /// all of them for `multi_entity` fields.
    pub fn entity_refs(&self) -> &[EntityRef] {
        match self {
            Value::Entity(r) => std::slice::from_ref(r),
            Value::MultiEntity(rs) => rs,
            _ => &[],
        }
    }

    /// Render for the wire. Dates become `YYYY-MM-DD`, datetimes RFC 3339,
    /// references `{"type": ..., "id": ...}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Checkbox(b) => serde_json::Value::Bool(*b),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(t) => serde_json::Value::String(t.to_rfc3339()),
            Value::Entity(r) => ref_to_json(r),
            Value::MultiEntity(rs) => serde_json::Value::Array(rs.iter().map(ref_to_json).collect()),
            Value::Json(v) => v.clone(),
        }
    }

    /// Coerce a wire JSON value into the shape `def` demands.
    ///
    /// `Ok(None)` means the caller sent an explicit null, which unsets the
    /// field. Entity references are checked against the field's
    /// `valid_types`; a single reference is accepted where a `multi_entity`
    /// field expects a list.
    pub fn coerce(
        entity_type: &str,
        field: &str,
        def: &FieldDef,
        raw: &serde_json::Value,
    ) -> Result<Option<Value>, ValidationError> {
        if raw.is_null() {
            return Ok(None);
        }
        let mismatch = || ValidationError::TypeMismatch {
            entity_type: entity_type.to_string(),
            field: field.to_string(),
            expected: def.data_type,
            got: raw.to_string(),
        };
        let value = match def.data_type {
            DataType::Text | DataType::StatusList | DataType::List | DataType::Color => {
                Value::Text(raw.as_str().ok_or_else(mismatch)?.to_string())
            }
            DataType::Number | DataType::Duration | DataType::Percent => {
                Value::Number(raw.as_i64().ok_or_else(mismatch)?)
            }
            DataType::Float => Value::Float(raw.as_f64().ok_or_else(mismatch)?),
            DataType::Checkbox => Value::Checkbox(raw.as_bool().ok_or_else(mismatch)?),
            DataType::Date => {
                Value::Date(parse_date(raw.as_str().ok_or_else(mismatch)?).ok_or_else(mismatch)?)
            }
            DataType::DateTime => Value::DateTime(
                parse_datetime(raw.as_str().ok_or_else(mismatch)?).ok_or_else(mismatch)?,
            ),
            DataType::Entity => {
                let entity = parse_ref(raw).ok_or_else(mismatch)?;
                check_link_type(entity_type, field, def, &entity)?;
                Value::Entity(entity)
            }
            DataType::MultiEntity => {
                // A bare reference is accepted and wrapped into a list.
                let raw_items: Vec<&serde_json::Value> = match raw {
                    serde_json::Value::Array(items) => items.iter().collect(),
                    serde_json::Value::Object(_) => vec![raw],
                    _ => return Err(mismatch()),
                };
                let mut refs = Vec::with_capacity(raw_items.len());
                for item in raw_items {
                    let entity = parse_ref(item).ok_or_else(mismatch)?;
                    check_link_type(entity_type, field, def, &entity)?;
                    refs.push(entity);
                }
                Value::MultiEntity(refs)
            }
            DataType::Serializable | DataType::Image | DataType::Url | DataType::TagList => {
                Value::Json(raw.clone())
            }
        };
        Ok(Some(value))
    }
}

fn ref_to_json(r: &EntityRef) -> serde_json::Value {
    serde_json::json!({ "type": r.entity_type, "id": r.id })
}

fn parse_ref(raw: &serde_json::Value) -> Option<EntityRef> {
    let obj = raw.as_object()?;
    let entity_type = obj.get("type")?.as_str()?;
    let id = obj.get("id")?.as_i64()?;
    Some(EntityRef::new(entity_type, id))
}

fn check_link_type(
    entity_type: &str,
    field: &str,
    def: &FieldDef,
    entity: &EntityRef,
) -> Result<(), ValidationError> {
    if def.valid_types.is_empty() || def.valid_types.iter().any(|t| t == &entity.entity_type) {
        Ok(())
    } else {
        Err(ValidationError::InvalidLinkType {
            entity_type: entity_type.to_string(),
            field: field.to_string(),
            got: entity.entity_type.clone(),
            valid_types: def.valid_types.clone(),
        })
    }
}

/// Parse a `YYYY-MM-DD` calendar day.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Parse an instant: RFC 3339, or the naive `YYYY-MM-DD HH:MM:SS` /
/// `YYYY-MM-DDTHH:MM:SS` forms (interpreted as UTC).
pub fn parse_datetime(raw: &str) -> Option<Timestamp> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Validated field values keyed by field name.
pub type FieldMap = BTreeMap<String, Value>;

// =============================================================================
// TESTS
// =============================================================================
