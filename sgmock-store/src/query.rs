//! Query engine
//!
//! find / find_one / summarize over the entity store: predicate filtering,
//! stable ordering with an id tiebreak, slice pagination, and field
//! projection including dotted relationship hops.

use crate::predicate::FilterEvaluator;
use crate::store::EntityStore;
use serde::Serialize;
use sgmock_core::{
    Aggregate, DataType, FieldPath, FilterSpec, Grouping, LogicalOperator, ProjectedRecord, Record,
    SchemaModel, ShotgridResult, SortDirection, SummaryField, Timestamp, ValidationError, Value,
};
use std::cmp::Ordering;
use tracing::debug;

// ============================================================================
// OPTIONS AND RESULTS
// ============================================================================

/// Options for a find call.
///
/// Ordering is stable and ties always break by ascending id, so identical
/// calls against an unmodified store page identically. `retired_only`
/// flips the result set to tombstoned records only.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Fields to project; dotted paths hop one relation. Empty means every
    /// stored field.
    pub fields: Vec<String>,
    pub order: Vec<sgmock_core::OrderClause>,
    pub filter_operator: LogicalOperator,
    pub limit: Option<usize>,
    /// 1-based page over the limited slice. Ignored without `limit`.
    pub page: Option<usize>,
    pub retired_only: bool,
}

/// Options for a summarize call.
#[derive(Debug, Clone, Default)]
pub struct SummarizeOptions {
    pub filter_operator: LogicalOperator,
    pub grouping: Vec<Grouping>,
}

/// Aggregated result of a summarize call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    pub summaries: ProjectedRecord,
    /// One entry per distinct group value; empty without grouping.
    pub groups: Vec<SummaryGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryGroup {
    pub group_name: String,
    pub group_value: serde_json::Value,
    pub summaries: ProjectedRecord,
}

// ============================================================================
// QUERY ENGINE
// ============================================================================

pub struct QueryEngine<'a> {
    schema: &'a SchemaModel,
    store: &'a EntityStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(schema: &'a SchemaModel, store: &'a EntityStore) -> Self {
        Self { schema, store }
    }

    /// Find records matching `filters`, projected to wire shape.
    ///
    /// `now` anchors any date sentinels, windows, and calendar buckets in
    /// the filters; callers inject it so results are deterministic.
    pub fn find(
        &self,
        entity_type: &str,
        filters: &[FilterSpec],
        options: &FindOptions,
        now: Timestamp,
    ) -> ShotgridResult<Vec<ProjectedRecord>> {
        self.schema.entity_type(entity_type)?;
        let paths = parse_projection(&options.fields)?;
        let evaluator = FilterEvaluator::new(self.schema, self.store);
        let filter = evaluator.compile(entity_type, filters, options.filter_operator, now)?;

        let mut matched: Vec<Record> = self
            .store
            .snapshot(entity_type)
            .into_iter()
            .filter(|record| record.deleted == options.retired_only)
            .filter(|record| evaluator.matches(&filter, record))
            .collect();

        sort_records(&mut matched, &options.order);
        let page = paginate(&matched, options.limit, options.page);
        debug!(
            entity_type,
            matched = matched.len(),
            returned = page.len(),
            "find"
        );
        Ok(page
            .iter()
            .map(|record| self.project(record, &paths))
            .collect())
    }

    /// Like [`find`](Self::find) with a limit of one.
    pub fn find_one(
        &self,
        entity_type: &str,
        filters: &[FilterSpec],
        options: &FindOptions,
        now: Timestamp,
    ) -> ShotgridResult<Option<ProjectedRecord>> {
        let mut single = options.clone();
        single.limit = Some(1);
        single.page = None;
        let mut results = self.find(entity_type, filters, &single, now)?;
        Ok(if results.is_empty() {
            None
        } else {
            Some(results.remove(0))
        })
    }

    /// Reduce matching records with per-field aggregates, optionally
    /// grouped by exact field value.
    pub fn summarize(
        &self,
        entity_type: &str,
        filters: &[FilterSpec],
        summary_fields: &[SummaryField],
        options: &SummarizeOptions,
        now: Timestamp,
    ) -> ShotgridResult<SummaryResult> {
        self.schema.entity_type(entity_type)?;
        for summary in summary_fields {
            let def = self.schema.field_def(entity_type, &summary.field)?;
            if summary.aggregate.is_numeric_only() && !def.data_type.is_numeric() {
                return Err(ValidationError::InvalidAggregate {
                    field: summary.field.clone(),
                    aggregate: summary.aggregate.as_db_str().to_string(),
                    data_type: def.data_type,
                }
                .into());
            }
        }
        for group in &options.grouping {
            self.schema.field_def(entity_type, &group.field)?;
        }

        let evaluator = FilterEvaluator::new(self.schema, self.store);
        let filter = evaluator.compile(entity_type, filters, options.filter_operator, now)?;
        let matched: Vec<Record> = self
            .store
            .snapshot(entity_type)
            .into_iter()
            .filter(|record| !record.deleted)
            .filter(|record| evaluator.matches(&filter, record))
            .collect();

        let summaries = compute_summaries(&matched, summary_fields, self.schema, entity_type);
        // Nested groupings are not emulated; the first clause decides.
        let groups = match options.grouping.first() {
            None => Vec::new(),
            Some(grouping) => {
                let mut buckets: Vec<(Option<Value>, Vec<Record>)> = Vec::new();
                for record in matched {
                    let key = record.resolve(&grouping.field);
                    match buckets.iter().position(|(k, _)| *k == key) {
                        Some(i) => buckets[i].1.push(record),
                        None => buckets.push((key, vec![record])),
                    }
                }
                buckets.sort_by(|(a, _), (b, _)| {
                    let ordering = option_value_cmp(a.as_ref(), b.as_ref());
                    if grouping.direction.is_descending() {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                });
                buckets
                    .into_iter()
                    .map(|(key, bucket)| SummaryGroup {
                        group_name: group_label(key.as_ref()),
                        group_value: key.map(|v| v.to_json()).unwrap_or(serde_json::Value::Null),
                        summaries: compute_summaries(
                            &bucket,
                            summary_fields,
                            self.schema,
                            entity_type,
                        ),
                    })
                    .collect()
            }
        };

        Ok(SummaryResult { summaries, groups })
    }

    /// Project one record to wire shape. Every projection carries `id` and
    /// `type`; a hop that misses projects null rather than failing.
    fn project(&self, record: &Record, paths: &[FieldPath]) -> ProjectedRecord {
        let mut out = ProjectedRecord::new();
        out.insert("id".to_string(), record.id.into());
        out.insert("type".to_string(), record.entity_type.clone().into());
        if paths.is_empty() {
            for (name, value) in &record.fields {
                out.insert(name.clone(), value.to_json());
            }
        } else {
            for path in paths {
                out.insert(path.to_string(), self.resolve_path(record, path));
            }
        }
        out
    }

    fn resolve_path(&self, record: &Record, path: &FieldPath) -> serde_json::Value {
        let Some(head) = record.resolve(&path.head) else {
            return serde_json::Value::Null;
        };
        let Some(hop) = &path.hop else {
            return head.to_json();
        };
        let leaves: Vec<serde_json::Value> = head
            .entity_refs()
            .iter()
            .filter(|r| r.entity_type == hop.linked_type)
            .filter_map(|r| self.store.get(&r.entity_type, r.id))
            .filter(|linked| !linked.deleted)
            .map(|linked| {
                linked
                    .resolve(&hop.leaf)
                    .map(|v| v.to_json())
                    .unwrap_or(serde_json::Value::Null)
            })
            .collect();
        match head {
            Value::MultiEntity(_) => serde_json::Value::Array(leaves),
            _ => leaves
                .into_iter()
                .next()
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

fn parse_projection(fields: &[String]) -> ShotgridResult<Vec<FieldPath>> {
    fields
        .iter()
        .map(|f| FieldPath::parse(f).map_err(Into::into))
        .collect()
}

// ============================================================================
// ORDERING AND PAGINATION
// ============================================================================

/// Total order across same-shape values; mismatched shapes rank equal and
/// fall through to the id tiebreak.
pub(crate) fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Number(a), Value::Float(b)) => {
            (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
        }
        (Value::Float(a), Value::Number(b)) => {
            a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
        }
        (Value::Checkbox(a), Value::Checkbox(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
        (Value::Date(a), Value::DateTime(b)) => a.cmp(&b.date_naive()),
        (Value::DateTime(a), Value::Date(b)) => a.date_naive().cmp(b),
        _ => Ordering::Equal,
    }
}

/// Absent values sort before present ones ascending.
fn option_value_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => value_cmp(a, b),
    }
}

fn sort_records(records: &mut [Record], order: &[sgmock_core::OrderClause]) {
    records.sort_by(|a, b| {
        for clause in order {
            let ordering = option_value_cmp(
                a.resolve(&clause.field).as_ref(),
                b.resolve(&clause.field).as_ref(),
            );
            let ordering = if clause.direction == SortDirection::Desc {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id.cmp(&b.id)
    });
}

fn paginate(records: &[Record], limit: Option<usize>, page: Option<usize>) -> &[Record] {
    let Some(limit) = limit else {
        return records;
    };
    let start = page
        .map(|p| p.saturating_sub(1).saturating_mul(limit))
        .unwrap_or(0)
        .min(records.len());
    let end = start.saturating_add(limit).min(records.len());
    &records[start..end]
}

// ============================================================================
// AGGREGATION
// ============================================================================

fn compute_summaries(
    records: &[Record],
    summary_fields: &[SummaryField],
    schema: &SchemaModel,
    entity_type: &str,
) -> ProjectedRecord {
    let mut out = ProjectedRecord::new();
    for summary in summary_fields {
        let values: Vec<Value> = records
            .iter()
            .filter_map(|record| record.resolve(&summary.field))
            .collect();
        let result = match summary.aggregate {
            Aggregate::RecordCount => serde_json::Value::from(records.len()),
            Aggregate::Count => serde_json::Value::from(values.len()),
            Aggregate::Sum => numeric_sum(&values, schema, entity_type, &summary.field),
            Aggregate::Avg => {
                if values.is_empty() {
                    serde_json::Value::Null
                } else {
                    let total: f64 = values.iter().filter_map(as_f64).sum();
                    serde_json::Number::from_f64(total / values.len() as f64)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Aggregate::Min => values
                .iter()
                .min_by(|a, b| value_cmp(a, b))
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null),
            Aggregate::Max => values
                .iter()
                .max_by(|a, b| value_cmp(a, b))
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null),
        };
        out.insert(summary.result_key().to_string(), result);
    }
    out
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Integer fields sum to an integer, float fields to a float. An empty set
/// sums to zero, matching the real service.
fn numeric_sum(
    values: &[Value],
    schema: &SchemaModel,
    entity_type: &str,
    field: &str,
) -> serde_json::Value {
    let is_float = schema
        .field_def(entity_type, field)
        .map(|def| def.data_type == DataType::Float)
        .unwrap_or(false);
    if is_float {
        let total: f64 = values.iter().filter_map(as_f64).sum();
        serde_json::Number::from_f64(total)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    } else {
        let total: i64 = values.iter().filter_map(Value::as_number).sum();
        serde_json::Value::from(total)
    }
}

fn group_label(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Text(s)) => s.clone(),
        Some(other) => match other.to_json() {
            serde_json::Value::String(s) => s,
            json => json.to_string(),
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================
