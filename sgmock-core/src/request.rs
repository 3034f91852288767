//! Wire request shapes
//!
//! Serde types for the caller-facing request formats: result ordering,
//! summary/grouping specs, and batch operation lists. These deserialize
//! straight from the JSON the tool layer receives.

use crate::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ORDERING
// ============================================================================

/// Sort direction for one order clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn is_descending(&self) -> bool {
        matches!(self, SortDirection::Desc)
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

/// One result-ordering clause. The wire accepts both the `field` and
/// `field_name` spellings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderClause {
    #[serde(alias = "field_name")]
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderClause {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

// ============================================================================
// SUMMARIES
// ============================================================================

/// Aggregate applied to one summary field.
///
/// `record_count` counts matched records regardless of field value; `count`
/// counts records where the field is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    RecordCount,
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl Aggregate {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Aggregate::RecordCount => "record_count",
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Avg => "avg",
        }
    }

    /// Aggregates that only make sense over numeric fields.
    pub fn is_numeric_only(&self) -> bool {
        matches!(self, Aggregate::Sum | Aggregate::Avg)
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// One requested summary: a field and the aggregate to reduce it with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryField {
    pub field: String,
    #[serde(rename = "type")]
    pub aggregate: Aggregate,
}

impl SummaryField {
    pub fn new(field: impl Into<String>, aggregate: Aggregate) -> Self {
        Self {
            field: field.into(),
            aggregate,
        }
    }

    /// Key under which this summary is reported, e.g. `id` for a
    /// `record_count` over `id`.
    pub fn result_key(&self) -> &str {
        &self.field
    }
}

/// Exact-value grouping for a summarize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grouping {
    #[serde(alias = "field_name")]
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Grouping {
    pub fn by(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }
}

// ============================================================================
// BATCH REQUESTS
// ============================================================================

/// One item of a batch call, tagged by `request_type` on the wire.
///
/// Items execute strictly in list order and independently: no rollback, a
/// failed item never stops the ones after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request_type", rename_all = "lowercase")]
pub enum BatchRequest {
    Create {
        entity_type: String,
        data: serde_json::Map<String, serde_json::Value>,
    },
    Update {
        entity_type: String,
        entity_id: EntityId,
        data: serde_json::Map<String, serde_json::Value>,
    },
    Delete {
        entity_type: String,
        entity_id: EntityId,
    },
}

impl BatchRequest {
    pub fn entity_type(&self) -> &str {
        match self {
            BatchRequest::Create { entity_type, .. }
            | BatchRequest::Update { entity_type, .. }
            | BatchRequest::Delete { entity_type, .. } => entity_type,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
