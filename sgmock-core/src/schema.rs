//! Schema model
//!
//! Immutable, in-memory description of entity types and their fields. The
//! engine only ever consumes an already-built [`SchemaModel`]; loading one
//! from disk or a remote service is a concern of the embedding application.

use crate::{SchemaError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DATA TYPES
// ============================================================================

/// Field data types understood by the mock backend.
///
/// The set mirrors the types the real service publishes in its schema
/// endpoint; opaque payload types (`serializable`, `image`, `url`,
/// `tag_list`) are stored verbatim and only support equality filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Number,
    Float,
    Checkbox,
    Date,
    DateTime,
    Duration,
    Percent,
    StatusList,
    List,
    Color,
    TagList,
    Serializable,
    Image,
    Url,
    Entity,
    MultiEntity,
}

impl DataType {
    /// Convert to the wire string used by the schema endpoint.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Number => "number",
            DataType::Float => "float",
            DataType::Checkbox => "checkbox",
            DataType::Date => "date",
            DataType::DateTime => "date_time",
            DataType::Duration => "duration",
            DataType::Percent => "percent",
            DataType::StatusList => "status_list",
            DataType::List => "list",
            DataType::Color => "color",
            DataType::TagList => "tag_list",
            DataType::Serializable => "serializable",
            DataType::Image => "image",
            DataType::Url => "url",
            DataType::Entity => "entity",
            DataType::MultiEntity => "multi_entity",
        }
    }

    /// Parse from the wire string.
    pub fn from_db_str(s: &str) -> Result<Self, DataTypeParseError> {
        match s {
            "text" => Ok(DataType::Text),
            "number" => Ok(DataType::Number),
            "float" => Ok(DataType::Float),
            "checkbox" => Ok(DataType::Checkbox),
            "date" => Ok(DataType::Date),
            "date_time" => Ok(DataType::DateTime),
            "duration" => Ok(DataType::Duration),
            "percent" => Ok(DataType::Percent),
            "status_list" => Ok(DataType::StatusList),
            "list" => Ok(DataType::List),
            "color" => Ok(DataType::Color),
            "tag_list" => Ok(DataType::TagList),
            "serializable" => Ok(DataType::Serializable),
            "image" => Ok(DataType::Image),
            "url" => Ok(DataType::Url),
            "entity" => Ok(DataType::Entity),
            "multi_entity" => Ok(DataType::MultiEntity),
            _ => Err(DataTypeParseError(s.to_string())),
        }
    }

    /// String-valued types, compared with the text operator family.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            DataType::Text | DataType::StatusList | DataType::List | DataType::Color
        )
    }

    /// Number-valued types. `duration` and `percent` are stored as integers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Number | DataType::Float | DataType::Duration | DataType::Percent
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime)
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, DataType::Entity | DataType::MultiEntity)
    }

    /// Opaque payloads: stored verbatim, equality filtering only.
    pub fn is_opaque(&self) -> bool {
        matches!(
            self,
            DataType::Serializable | DataType::Image | DataType::Url | DataType::TagList
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for DataType {
    type Err = DataTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid data type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeParseError(pub String);

impl fmt::Display for DataTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid data type: {}", self.0)
    }
}

impl std::error::Error for DataTypeParseError {}

// ============================================================================
// FIELD AND ENTITY TYPE DEFINITIONS
// ============================================================================

/// Definition of a single field on an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub data_type: DataType,
    /// Permissible linked entity types. Only meaningful for relation fields;
    /// empty means any type is accepted.
    pub valid_types: Vec<String>,
    /// Value assigned on create when the caller leaves the field unset.
    pub default_value: Option<Value>,
}

impl FieldDef {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            valid_types: Vec::new(),
            default_value: None,
        }
    }

    pub fn with_default(data_type: DataType, default_value: Value) -> Self {
        Self {
            data_type,
            valid_types: Vec::new(),
            default_value: Some(default_value),
        }
    }

    pub fn relation(data_type: DataType, valid_types: &[&str]) -> Self {
        Self {
            data_type,
            valid_types: valid_types.iter().map(|t| t.to_string()).collect(),
            default_value: None,
        }
    }
}

/// Definition of one entity type: its name and field table.
///
/// Every entity type carries the built-in `id` (number) and `type` (text)
/// fields; [`SchemaBuilder`] adds them automatically.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTypeDef {
    pub name: String,
    pub fields: BTreeMap<String, FieldDef>,
}

impl EntityTypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), FieldDef::new(DataType::Number));
        fields.insert("type".to_string(), FieldDef::new(DataType::Text));
        Self { name, fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }
}

// ============================================================================
// SCHEMA MODEL
// ============================================================================

/// The full schema: every entity type the store knows about.
///
/// Read-only after construction. A relation field's `valid_types` may name
/// entity types that are not defined here; traversal to them simply finds
/// nothing rather than failing at schema construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaModel {
    entity_types: BTreeMap<String, EntityTypeDef>,
}

impl SchemaModel {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn has_entity_type(&self, name: &str) -> bool {
        self.entity_types.contains_key(name)
    }

    pub fn entity_type(&self, name: &str) -> Result<&EntityTypeDef, SchemaError> {
        self.entity_types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownEntityType {
                entity_type: name.to_string(),
            })
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityTypeDef> {
        self.entity_types.values()
    }

    pub fn field_def(&self, entity_type: &str, field: &str) -> Result<&FieldDef, SchemaError> {
        self.entity_type(entity_type)?
            .field(field)
            .ok_or_else(|| SchemaError::UnknownField {
                entity_type: entity_type.to_string(),
                field: field.to_string(),
            })
    }

    /// Permissible linked types for a relation field.
    pub fn resolve_relation_target(
        &self,
        entity_type: &str,
        field: &str,
    ) -> Result<&[String], SchemaError> {
        let def = self.field_def(entity_type, field)?;
        if def.data_type.is_relation() {
            Ok(&def.valid_types)
        } else {
            Err(SchemaError::NotARelation {
                entity_type: entity_type.to_string(),
                field: field.to_string(),
            })
        }
    }
}

/// Fluent constructor for a [`SchemaModel`].
///
/// Entity types are created on first mention, so field registration order
/// is free. `id` and `type` are defined on every entity type.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entity_types: BTreeMap<String, EntityTypeDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, entity_type: &str) -> &mut EntityTypeDef {
        self.entity_types
            .entry(entity_type.to_string())
            .or_insert_with(|| EntityTypeDef::new(entity_type))
    }

    /// Register an entity type with only the built-in fields.
    pub fn entity_type(mut self, name: &str) -> Self {
        self.entry(name);
        self
    }

    pub fn field(mut self, entity_type: &str, field: &str, data_type: DataType) -> Self {
        self.entry(entity_type)
            .fields
            .insert(field.to_string(), FieldDef::new(data_type));
        self
    }

    pub fn field_with_default(
        mut self,
        entity_type: &str,
        field: &str,
        data_type: DataType,
        default_value: Value,
    ) -> Self {
        self.entry(entity_type)
            .fields
            .insert(field.to_string(), FieldDef::with_default(data_type, default_value));
        self
    }

    pub fn entity_field(mut self, entity_type: &str, field: &str, valid_types: &[&str]) -> Self {
        self.entry(entity_type)
            .fields
            .insert(field.to_string(), FieldDef::relation(DataType::Entity, valid_types));
        self
    }

    pub fn multi_entity_field(
        mut self,
        entity_type: &str,
        field: &str,
        valid_types: &[&str],
    ) -> Self {
        self.entry(entity_type).fields.insert(
            field.to_string(),
            FieldDef::relation(DataType::MultiEntity, valid_types),
        );
        self
    }

    pub fn build(self) -> SchemaModel {
        SchemaModel {
            entity_types: self.entity_types,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
