//! sgmock Core - Data Types
//!
//! Pure data structures for the sgmock ShotGrid mock backend. This crate
//! contains the value model, schema model, filter expression model, wire
//! request shapes, and the error taxonomy. Storage and evaluation logic
//! live in `sgmock-store`.

use chrono::{DateTime, Utc};

pub mod error;
pub mod filter;
pub mod record;
pub mod request;
pub mod schema;
pub mod value;

pub use error::{
    FilterError, SchemaError, ShotgridError, ShotgridResult, StorageError, ValidationError,
};
pub use filter::{
    date_sentinel, FieldPath, FilterOperator, FilterSpec, LogicalOperator, PathHop, TimeUnit,
    TimeWindow,
};
pub use record::{ProjectedRecord, Record};
pub use request::{Aggregate, BatchRequest, Grouping, OrderClause, SortDirection, SummaryField};
pub use schema::{DataType, DataTypeParseError, EntityTypeDef, FieldDef, SchemaBuilder, SchemaModel};
pub use value::{parse_date, parse_datetime, EntityRef, FieldMap, Value};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier. Assigned by the store, strictly increasing per entity
/// type, never reused, not even after delete and revive.
pub type EntityId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
