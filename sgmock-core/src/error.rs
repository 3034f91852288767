//! Error types for sgmock operations

use crate::{DataType, EntityId, FilterOperator};
use thiserror::Error;

/// Schema lookup errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown entity type: {entity_type}")]
    UnknownEntityType { entity_type: String },

    #[error("Unknown field: {entity_type}.{field}")]
    UnknownField { entity_type: String, field: String },

    #[error("{entity_type}.{field} is not a relation field")]
    NotARelation { entity_type: String, field: String },
}

/// Data validation errors, raised before any mutation is applied.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{entity_type}.{field} is of type {expected}, but data {got} does not match")]
    TypeMismatch {
        entity_type: String,
        field: String,
        expected: DataType,
        got: String,
    },

    #[error("{entity_type}.{field} links to {got}, expected one of {valid_types:?}")]
    InvalidLinkType {
        entity_type: String,
        field: String,
        got: String,
        valid_types: Vec<String>,
    },

    #[error("Can't include {field} in data, it is assigned by the store")]
    ReservedField { field: String },

    #[error("Summary type {aggregate} is not valid for {field} ({data_type})")]
    InvalidAggregate {
        field: String,
        aggregate: String,
        data_type: DataType,
    },
}

/// Filter compilation errors. All of these are raised when a filter list is
/// compiled into a predicate, never per-record.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    #[error("Filter {index} is malformed: {reason}")]
    InvalidShape { index: usize, reason: String },

    #[error("Invalid field path: {path}")]
    InvalidFieldPath { path: String },

    #[error("Unknown filter operator: {operator}")]
    UnknownOperator { operator: String },

    #[error("Operator {operator} is not valid for {field} ({data_type})")]
    InvalidOperator {
        field: String,
        operator: FilterOperator,
        data_type: DataType,
    },

    #[error("Filter value for {field} {operator}: {reason}")]
    TypeMismatch {
        field: String,
        operator: FilterOperator,
        reason: String,
    },

    #[error("Invalid time window: {value}")]
    InvalidTimeWindow { value: String },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: EntityId },

    #[error("Insert failed for {entity_type} with id {id}: {reason}")]
    InsertFailed {
        entity_type: String,
        id: EntityId,
        reason: String,
    },
}

/// Master error type for all sgmock errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShotgridError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for sgmock operations.
pub type ShotgridResult<T> = Result<T, ShotgridError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display_unknown_field() {
        let err = SchemaError::UnknownField {
            entity_type: "Shot".to_string(),
            field: "sg_missing".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Unknown field"));
        assert!(msg.contains("Shot.sg_missing"));
    }

    #[test]
    fn test_validation_error_display_type_mismatch() {
        let err = ValidationError::TypeMismatch {
            entity_type: "Shot".to_string(),
            field: "sg_cut_in".to_string(),
            expected: DataType::Number,
            got: "\"abc\"".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Shot.sg_cut_in"));
        assert!(msg.contains("number"));
        assert!(msg.contains("\"abc\""));
    }

    #[test]
    fn test_filter_error_display_invalid_operator() {
        let err = FilterError::InvalidOperator {
            field: "code".to_string(),
            operator: FilterOperator::LessThan,
            data_type: DataType::Text,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("less_than"));
        assert!(msg.contains("code"));
        assert!(msg.contains("text"));
    }

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity_type: "Task".to_string(),
            id: 42,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("Task"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_shotgrid_error_from_variants() {
        let schema = ShotgridError::from(SchemaError::UnknownEntityType {
            entity_type: "Widget".to_string(),
        });
        assert!(matches!(schema, ShotgridError::Schema(_)));

        let validation = ShotgridError::from(ValidationError::ReservedField {
            field: "id".to_string(),
        });
        assert!(matches!(validation, ShotgridError::Validation(_)));

        let filter = ShotgridError::from(FilterError::InvalidFieldPath {
            path: "a.b".to_string(),
        });
        assert!(matches!(filter, ShotgridError::Filter(_)));

        let storage = ShotgridError::from(StorageError::NotFound {
            entity_type: "Shot".to_string(),
            id: 1,
        });
        assert!(matches!(storage, ShotgridError::Storage(_)));
    }
}
