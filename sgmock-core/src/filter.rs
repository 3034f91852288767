//! Filter expressions
//!
//! The wire format is the ShotGrid one: an ordered list of
//! `[field_path, operator, value]` triples plus an optional `"and"`/`"or"`
//! combinator across the list. Triples are parsed once into [`FilterSpec`]
//! values, dotted field paths into a typed [`FieldPath`] and the operator
//! string into a [`FilterOperator`], so malformed filters fail at
//! construction, not per record.

use crate::{EntityId, EntityRef, FilterError};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// OPERATORS
// ============================================================================

/// Filter operator for field comparisons.
///
/// Which operators apply to which field data types is decided when a filter
/// list is compiled into a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Is,
    IsNot,
    LessThan,
    GreaterThan,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Between,
    NotBetween,
    In,
    NotIn,
    InLast,
    NotInLast,
    InNext,
    NotInNext,
    InCalendarDay,
    InCalendarWeek,
    InCalendarMonth,
    InCalendarYear,
    TypeIs,
    TypeIsNot,
    NameIs,
    NameContains,
    NameNotContains,
}

impl FilterOperator {
    /// Convert to the wire string.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            FilterOperator::Is => "is",
            FilterOperator::IsNot => "is_not",
            FilterOperator::LessThan => "less_than",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not_contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::Between => "between",
            FilterOperator::NotBetween => "not_between",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
            FilterOperator::InLast => "in_last",
            FilterOperator::NotInLast => "not_in_last",
            FilterOperator::InNext => "in_next",
            FilterOperator::NotInNext => "not_in_next",
            FilterOperator::InCalendarDay => "in_calendar_day",
            FilterOperator::InCalendarWeek => "in_calendar_week",
            FilterOperator::InCalendarMonth => "in_calendar_month",
            FilterOperator::InCalendarYear => "in_calendar_year",
            FilterOperator::TypeIs => "type_is",
            FilterOperator::TypeIsNot => "type_is_not",
            FilterOperator::NameIs => "name_is",
            FilterOperator::NameContains => "name_contains",
            FilterOperator::NameNotContains => "name_not_contains",
        }
    }

    /// Parse from the wire string.
    pub fn from_db_str(s: &str) -> Result<Self, FilterError> {
        match s {
            "is" => Ok(FilterOperator::Is),
            "is_not" => Ok(FilterOperator::IsNot),
            "less_than" => Ok(FilterOperator::LessThan),
            "greater_than" => Ok(FilterOperator::GreaterThan),
            "contains" => Ok(FilterOperator::Contains),
            "not_contains" => Ok(FilterOperator::NotContains),
            "starts_with" => Ok(FilterOperator::StartsWith),
            "ends_with" => Ok(FilterOperator::EndsWith),
            "between" => Ok(FilterOperator::Between),
            "not_between" => Ok(FilterOperator::NotBetween),
            "in" => Ok(FilterOperator::In),
            "not_in" => Ok(FilterOperator::NotIn),
            "in_last" => Ok(FilterOperator::InLast),
            "not_in_last" => Ok(FilterOperator::NotInLast),
            "in_next" => Ok(FilterOperator::InNext),
            "not_in_next" => Ok(FilterOperator::NotInNext),
            "in_calendar_day" => Ok(FilterOperator::InCalendarDay),
            "in_calendar_week" => Ok(FilterOperator::InCalendarWeek),
            "in_calendar_month" => Ok(FilterOperator::InCalendarMonth),
            "in_calendar_year" => Ok(FilterOperator::InCalendarYear),
            "type_is" => Ok(FilterOperator::TypeIs),
            "type_is_not" => Ok(FilterOperator::TypeIsNot),
            "name_is" => Ok(FilterOperator::NameIs),
            "name_contains" => Ok(FilterOperator::NameContains),
            "name_not_contains" => Ok(FilterOperator::NameNotContains),
            _ => Err(FilterError::UnknownOperator {
                operator: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for FilterOperator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Combinator applied across a top-level filter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn from_db_str(s: &str) -> Result<Self, FilterError> {
        match s {
            "and" => Ok(LogicalOperator::And),
            "or" => Ok(LogicalOperator::Or),
            _ => Err(FilterError::UnknownOperator {
                operator: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "and"),
            LogicalOperator::Or => write!(f, "or"),
        }
    }
}

// ============================================================================
// FIELD PATHS
// ============================================================================

/// One relationship hop: `relation.LinkedType.leaf` narrows the link to
/// `linked_type` and evaluates `leaf` on the linked record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathHop {
    pub linked_type: String,
    pub leaf: String,
}

/// A parsed field path: a bare field name, or a single hop through a
/// relation field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub head: String,
    pub hop: Option<PathHop>,
}

impl FieldPath {
    /// Parse a dotted path. One segment is a direct field, three segments a
    /// hop; anything else is malformed.
    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        let malformed = || FilterError::InvalidFieldPath {
            path: raw.to_string(),
        };
        let segments: Vec<&str> = raw.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(malformed());
        }
        match segments.as_slice() {
            [head] => Ok(Self {
                head: head.to_string(),
                hop: None,
            }),
            [head, linked_type, leaf] => Ok(Self {
                head: head.to_string(),
                hop: Some(PathHop {
                    linked_type: linked_type.to_string(),
                    leaf: leaf.to_string(),
                }),
            }),
            _ => Err(malformed()),
        }
    }

    pub fn is_hopped(&self) -> bool {
        self.hop.is_some()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hop {
            None => write!(f, "{}", self.head),
            Some(hop) => write!(f, "{}.{}.{}", self.head, hop.linked_type, hop.leaf),
        }
    }
}

// ============================================================================
// FILTER SPECS
// ============================================================================

/// A single parsed filter condition.
///
/// The value stays loose JSON here; it is coerced against the target
/// field's data type when the filter list is compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub path: FieldPath,
    pub operator: FilterOperator,
    pub value: serde_json::Value,
}

impl FilterSpec {
    pub fn new(
        path: &str,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            path: FieldPath::parse(path)?,
            operator,
            value,
        })
    }

    /// Parse one wire triple `[field_path, operator, value]`.
    pub fn from_wire(index: usize, raw: &serde_json::Value) -> Result<Self, FilterError> {
        let items = raw
            .as_array()
            .filter(|items| items.len() == 3)
            .ok_or_else(|| FilterError::InvalidShape {
                index,
                reason: "expected [field, operator, value]".to_string(),
            })?;
        let path = items[0].as_str().ok_or_else(|| FilterError::InvalidShape {
            index,
            reason: "field path must be a string".to_string(),
        })?;
        let operator = items[1].as_str().ok_or_else(|| FilterError::InvalidShape {
            index,
            reason: "operator must be a string".to_string(),
        })?;
        Ok(Self {
            path: FieldPath::parse(path)?,
            operator: FilterOperator::from_db_str(operator)?,
            value: items[2].clone(),
        })
    }

    /// Parse a full wire filter list.
    pub fn from_wire_list(raw: &[serde_json::Value]) -> Result<Vec<Self>, FilterError> {
        raw.iter()
            .enumerate()
            .map(|(index, item)| Self::from_wire(index, item))
            .collect()
    }

    // Convenience constructors for the common cases; the full operator set
    // goes through `new`.

    pub fn is(path: &str, value: serde_json::Value) -> Result<Self, FilterError> {
        Self::new(path, FilterOperator::Is, value)
    }

    pub fn is_not(path: &str, value: serde_json::Value) -> Result<Self, FilterError> {
        Self::new(path, FilterOperator::IsNot, value)
    }

    pub fn contains(path: &str, value: &str) -> Result<Self, FilterError> {
        Self::new(path, FilterOperator::Contains, value.into())
    }

    pub fn in_list(path: &str, values: Vec<serde_json::Value>) -> Result<Self, FilterError> {
        Self::new(path, FilterOperator::In, serde_json::Value::Array(values))
    }

    pub fn between(
        path: &str,
        low: serde_json::Value,
        high: serde_json::Value,
    ) -> Result<Self, FilterError> {
        Self::new(
            path,
            FilterOperator::Between,
            serde_json::Value::Array(vec![low, high]),
        )
    }

    pub fn linked_to(path: &str, entity: &EntityRef) -> Result<Self, FilterError> {
        Self::new(
            path,
            FilterOperator::Is,
            serde_json::json!({ "type": entity.entity_type, "id": entity.id }),
        )
    }

    pub fn id_is(id: EntityId) -> Self {
        Self {
            path: FieldPath {
                head: "id".to_string(),
                hop: None,
            },
            operator: FilterOperator::Is,
            value: id.into(),
        }
    }
}

// ============================================================================
// TIME WINDOWS AND SENTINELS
// ============================================================================

/// Time unit for relative window filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    /// Wire representation, as the real service spells it.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TimeUnit::Day => "DAY",
            TimeUnit::Week => "WEEK",
            TimeUnit::Month => "MONTH",
            TimeUnit::Year => "YEAR",
        }
    }

    /// Parse a unit name. Case-insensitive, plural accepted.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "days" => Some(TimeUnit::Day),
            "week" | "weeks" => Some(TimeUnit::Week),
            "month" | "months" => Some(TimeUnit::Month),
            "year" | "years" => Some(TimeUnit::Year),
            _ => None,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// A relative window spec: `N` units back from or forward of "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub count: u32,
    pub unit: TimeUnit,
}

static WINDOW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s+([A-Za-z]+)\s*$").expect("valid window regex"));

impl TimeWindow {
    /// Parse a window value. Both wire shapes are accepted: the service's
    /// `[N, "UNIT"]` array and the human `"N unit"` string.
    pub fn from_wire(raw: &serde_json::Value) -> Result<Self, FilterError> {
        let invalid = || FilterError::InvalidTimeWindow {
            value: raw.to_string(),
        };
        match raw {
            serde_json::Value::String(s) => {
                let captures = WINDOW_RE.captures(s).ok_or_else(invalid)?;
                let count: u32 = captures[1].parse().map_err(|_| invalid())?;
                let unit = TimeUnit::from_db_str(&captures[2]).ok_or_else(invalid)?;
                Ok(Self { count, unit })
            }
            serde_json::Value::Array(items) if items.len() == 2 => {
                let count = items[0]
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(invalid)?;
                let unit = items[1]
                    .as_str()
                    .and_then(TimeUnit::from_db_str)
                    .ok_or_else(invalid)?;
                Ok(Self { count, unit })
            }
            _ => Err(invalid()),
        }
    }
}

/// Resolve the `$today` / `$yesterday` / `$tomorrow` sentinels to a calendar
/// day relative to `today`. Non-sentinel strings return `None`.
pub fn date_sentinel(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    match raw {
        "$today" => Some(today),
        "$yesterday" => today.pred_opt(),
        "$tomorrow" => today.succ_opt(),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_round_trip() {
        for op in [
            FilterOperator::Is,
            FilterOperator::NotContains,
            FilterOperator::InCalendarWeek,
            FilterOperator::TypeIsNot,
            FilterOperator::NameNotContains,
        ] {
            assert_eq!(FilterOperator::from_db_str(op.as_db_str()).unwrap(), op);
        }
        assert!(matches!(
            FilterOperator::from_db_str("glob"),
            Err(FilterError::UnknownOperator { .. })
        ));
    }

    #[test]
    fn test_field_path_single_segment() {
        let path = FieldPath::parse("sg_status_list").unwrap();
        assert_eq!(path.head, "sg_status_list");
        assert!(!path.is_hopped());
    }

    #[test]
    fn test_field_path_hop() {
        let path = FieldPath::parse("entity.Shot.code").unwrap();
        assert_eq!(path.head, "entity");
        let hop = path.hop.unwrap();
        assert_eq!(hop.linked_type, "Shot");
        assert_eq!(hop.leaf, "code");
    }

    #[test]
    fn test_field_path_rejects_two_and_four_segments() {
        assert!(FieldPath::parse("entity.Shot").is_err());
        assert!(FieldPath::parse("a.B.c.d").is_err());
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("entity..code").is_err());
    }

    #[test]
    fn test_field_path_display_round_trip() {
        for raw in ["code", "entity.Shot.code"] {
            assert_eq!(FieldPath::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn test_filter_spec_from_wire() {
        let spec = FilterSpec::from_wire(0, &json!(["sg_status_list", "is", "ip"])).unwrap();
        assert_eq!(spec.operator, FilterOperator::Is);
        assert_eq!(spec.value, json!("ip"));
    }

    #[test]
    fn test_filter_spec_from_wire_bad_shapes() {
        let err = FilterSpec::from_wire(2, &json!(["code", "is"])).unwrap_err();
        assert!(matches!(err, FilterError::InvalidShape { index: 2, .. }));

        let err = FilterSpec::from_wire(0, &json!([1, "is", "x"])).unwrap_err();
        assert!(matches!(err, FilterError::InvalidShape { .. }));

        let err = FilterSpec::from_wire(0, &json!(["code", "glob", "x"])).unwrap_err();
        assert!(matches!(err, FilterError::UnknownOperator { .. }));
    }

    #[test]
    fn test_convenience_constructors() {
        let spec = FilterSpec::is("sg_status_list", json!("ip")).unwrap();
        assert_eq!(spec.operator, FilterOperator::Is);

        let spec = FilterSpec::between("sg_cut_in", json!(1000), json!(1100)).unwrap();
        assert_eq!(spec.value, json!([1000, 1100]));

        let spec = FilterSpec::in_list("code", vec![json!("SH010"), json!("SH020")]).unwrap();
        assert_eq!(spec.operator, FilterOperator::In);

        let spec = FilterSpec::linked_to("project", &EntityRef::new("Project", 7)).unwrap();
        assert_eq!(spec.value, json!({"type": "Project", "id": 7}));

        let spec = FilterSpec::id_is(42);
        assert_eq!(spec.path.head, "id");
        assert_eq!(spec.value, json!(42));
    }

    #[test]
    fn test_time_window_from_string() {
        let window = TimeWindow::from_wire(&json!("3 months")).unwrap();
        assert_eq!(window.count, 3);
        assert_eq!(window.unit, TimeUnit::Month);

        let window = TimeWindow::from_wire(&json!("1 DAY")).unwrap();
        assert_eq!(window.unit, TimeUnit::Day);
    }

    #[test]
    fn test_time_window_from_array() {
        let window = TimeWindow::from_wire(&json!([7, "DAY"])).unwrap();
        assert_eq!(window.count, 7);
        assert_eq!(window.unit, TimeUnit::Day);
    }

    #[test]
    fn test_time_window_rejects_garbage() {
        for raw in [json!("soon"), json!([7]), json!([-2, "DAY"]), json!(7)] {
            assert!(TimeWindow::from_wire(&raw).is_err());
        }
    }

    #[test]
    fn test_date_sentinels() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(date_sentinel("$today", today), Some(today));
        assert_eq!(
            date_sentinel("$yesterday", today),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert_eq!(
            date_sentinel("$tomorrow", today),
            NaiveDate::from_ymd_opt(2025, 3, 2)
        );
        assert_eq!(date_sentinel("2025-03-01", today), None);
    }
}
