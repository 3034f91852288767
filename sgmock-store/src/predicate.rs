//! Filter compilation and evaluation
//!
//! A filter list is compiled once per query: field paths are resolved
//! against the schema, operators are checked against the target field's
//! data type, and the loose JSON values are coerced into typed operands.
//! Sentinels (`$today`…) and relative windows are resolved against the
//! evaluation instant supplied by the caller, so a compiled filter is a
//! pure function of the records it sees.
//!
//! Relationship hops (`relation.LinkedType.leaf`) fetch the linked record
//! from the store at evaluation time. A missing, null, mistyped, or
//! dangling link makes the condition false, never an error.

use crate::store::EntityStore;
use chrono::{Datelike, Days, Months, NaiveDate};
use sgmock_core::{
    date_sentinel, parse_date, parse_datetime, DataType, EntityRef, FieldDef, FilterError,
    FilterOperator, FilterSpec, LogicalOperator, PathHop, Record, SchemaModel, ShotgridResult,
    TimeUnit, TimeWindow, Timestamp, Value,
};

// ============================================================================
// COMPILED FORM
// ============================================================================

/// A filter list compiled into typed per-field tests.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    combinator: LogicalOperator,
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone)]
struct Condition {
    field: String,
    hop: Option<PathHop>,
    test: FieldTest,
}

#[derive(Debug, Clone)]
enum FieldTest {
    /// Statically unsatisfiable, e.g. a hop through a linked type the
    /// schema does not define.
    Never,
    Text(TextTest),
    Int(NumberTest<i64>),
    Float(NumberTest<f64>),
    Bool { operand: bool, negate: bool },
    Date(DateTest),
    Ref(RefTest),
    Json { operand: serde_json::Value, negate: bool },
}

#[derive(Debug, Clone)]
enum TextTest {
    Is(String),
    IsNot(String),
    Contains(String),
    NotContains(String),
    StartsWith(String),
    EndsWith(String),
    In(Vec<String>),
    NotIn(Vec<String>),
}

#[derive(Debug, Clone)]
enum NumberTest<T> {
    Is(T),
    IsNot(T),
    LessThan(T),
    GreaterThan(T),
    Between(T, T),
    NotBetween(T, T),
    In(Vec<T>),
    NotIn(Vec<T>),
}

/// A date-family operand: either a calendar day or an exact instant.
/// Calendar days compare against `date_time` values by their whole day.
#[derive(Debug, Clone, Copy)]
enum DateOperand {
    Day(NaiveDate),
    Instant(Timestamp),
}

#[derive(Debug, Clone)]
enum DateTest {
    Is(DateOperand),
    IsNot(DateOperand),
    Before(DateOperand),
    After(DateOperand),
    Between(DateOperand, DateOperand),
    NotBetween(DateOperand, DateOperand),
    In(Vec<DateOperand>),
    NotIn(Vec<DateOperand>),
    Window {
        start: Timestamp,
        end: Timestamp,
        negate: bool,
    },
    Calendar {
        unit: TimeUnit,
        anchor: NaiveDate,
    },
}

#[derive(Debug, Clone)]
enum RefTest {
    Is(EntityRef),
    IsNot(EntityRef),
    In(Vec<EntityRef>),
    NotIn(Vec<EntityRef>),
    TypeIs(String),
    TypeIsNot(String),
    NameIs(String),
    NameContains(String),
    NameNotContains(String),
}

// ============================================================================
// EVALUATOR
// ============================================================================

/// Compiles filter lists and evaluates them against candidate records.
pub struct FilterEvaluator<'a> {
    schema: &'a SchemaModel,
    store: &'a EntityStore,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(schema: &'a SchemaModel, store: &'a EntityStore) -> Self {
        Self { schema, store }
    }

    /// Compile a filter list for `entity_type`.
    ///
    /// `now` anchors sentinel dates, relative windows, and calendar
    /// buckets; it is injected by the caller so evaluation is
    /// deterministic. An empty filter list always matches.
    pub fn compile(
        &self,
        entity_type: &str,
        filters: &[FilterSpec],
        combinator: LogicalOperator,
        now: Timestamp,
    ) -> ShotgridResult<CompiledFilter> {
        let mut conditions = Vec::with_capacity(filters.len());
        for spec in filters {
            conditions.push(self.compile_one(entity_type, spec, now)?);
        }
        Ok(CompiledFilter {
            combinator,
            conditions,
        })
    }

    fn compile_one(
        &self,
        entity_type: &str,
        spec: &FilterSpec,
        now: Timestamp,
    ) -> ShotgridResult<Condition> {
        let head_def = self.schema.field_def(entity_type, &spec.path.head)?;
        match &spec.path.hop {
            None => Ok(Condition {
                field: spec.path.head.clone(),
                hop: None,
                test: compile_test(&spec.path.head, head_def, spec, now)?,
            }),
            Some(hop) => {
                // The head must be a relation to hop through.
                self.schema
                    .resolve_relation_target(entity_type, &spec.path.head)?;
                // A hop through an undefined linked type can never match,
                // but it is not a schema error: valid_types may legitimately
                // name types this schema does not carry.
                let test = if self.schema.has_entity_type(&hop.linked_type) {
                    let leaf_def = self.schema.field_def(&hop.linked_type, &hop.leaf)?;
                    compile_test(&hop.leaf, leaf_def, spec, now)?
                } else {
                    FieldTest::Never
                };
                Ok(Condition {
                    field: spec.path.head.clone(),
                    hop: Some(hop.clone()),
                    test,
                })
            }
        }
    }

    /// Evaluate a compiled filter against one record.
    pub fn matches(&self, filter: &CompiledFilter, record: &Record) -> bool {
        if filter.conditions.is_empty() {
            return true;
        }
        match filter.combinator {
            LogicalOperator::And => filter
                .conditions
                .iter()
                .all(|c| self.eval_condition(c, record)),
            LogicalOperator::Or => filter
                .conditions
                .iter()
                .any(|c| self.eval_condition(c, record)),
        }
    }

    fn eval_condition(&self, condition: &Condition, record: &Record) -> bool {
        match &condition.hop {
            None => {
                let value = record.resolve(&condition.field);
                self.eval_test(&condition.test, value.as_ref())
            }
            Some(hop) => {
                let Some(head) = record.resolve(&condition.field) else {
                    return false;
                };
                head.entity_refs()
                    .iter()
                    .filter(|r| r.entity_type == hop.linked_type)
                    .filter_map(|r| self.fetch_live(r))
                    .any(|linked| {
                        let leaf = linked.resolve(&hop.leaf);
                        self.eval_test(&condition.test, leaf.as_ref())
                    })
            }
        }
    }

    /// Linked-record fetch for hops and name operators. Tombstoned records
    /// are treated as absent.
    fn fetch_live(&self, entity: &EntityRef) -> Option<Record> {
        self.store
            .get(&entity.entity_type, entity.id)
            .filter(|r| !r.deleted)
    }

    fn eval_test(&self, test: &FieldTest, value: Option<&Value>) -> bool {
        match test {
            FieldTest::Never => false,
            FieldTest::Text(t) => eval_text(t, value),
            FieldTest::Int(t) => eval_number(t, value.and_then(|v| v.as_number())),
            FieldTest::Float(t) => eval_number(
                t,
                value.and_then(|v| match v {
                    Value::Float(f) => Some(*f),
                    Value::Number(n) => Some(*n as f64),
                    _ => None,
                }),
            ),
            FieldTest::Bool { operand, negate } => {
                let hit = matches!(value, Some(Value::Checkbox(b)) if b == operand);
                hit != *negate
            }
            FieldTest::Date(t) => eval_date(t, value),
            FieldTest::Ref(t) => self.eval_ref(t, value),
            FieldTest::Json { operand, negate } => {
                let hit = matches!(value, Some(Value::Json(v)) if v == operand);
                hit != *negate
            }
        }
    }

    fn eval_ref(&self, test: &RefTest, value: Option<&Value>) -> bool {
        let refs: &[EntityRef] = value.map(|v| v.entity_refs()).unwrap_or(&[]);
        match test {
            RefTest::Is(operand) => refs.contains(operand),
            RefTest::IsNot(operand) => !refs.contains(operand),
            RefTest::In(operands) => refs.iter().any(|r| operands.contains(r)),
            RefTest::NotIn(operands) => !refs.iter().any(|r| operands.contains(r)),
            RefTest::TypeIs(name) => refs.iter().any(|r| &r.entity_type == name),
            RefTest::TypeIsNot(name) => !refs.iter().any(|r| &r.entity_type == name),
            RefTest::NameIs(expected) => self.any_linked_name(refs, |n| n == expected.as_str()),
            RefTest::NameContains(needle) => self.any_linked_name(refs, |n| n.contains(needle)),
            RefTest::NameNotContains(needle) => {
                !self.any_linked_name(refs, |n| n.contains(needle))
            }
        }
    }

    fn any_linked_name(&self, refs: &[EntityRef], pred: impl Fn(&str) -> bool) -> bool {
        refs.iter()
            .filter_map(|r| self.fetch_live(r))
            .any(|linked| linked.display_name().map(&pred).unwrap_or(false))
    }
}

// ============================================================================
// PER-FAMILY COMPILATION
// ============================================================================

fn compile_test(
    field: &str,
    def: &FieldDef,
    spec: &FilterSpec,
    now: Timestamp,
) -> Result<FieldTest, FilterError> {
    let dt = def.data_type;
    if dt.is_textual() {
        compile_text(field, spec).map(FieldTest::Text)
    } else if dt == DataType::Float {
        compile_float(field, spec).map(FieldTest::Float)
    } else if dt.is_numeric() {
        compile_int(field, spec).map(FieldTest::Int)
    } else if dt == DataType::Checkbox {
        compile_bool(field, dt, spec)
    } else if dt.is_temporal() {
        compile_date(field, dt, spec, now).map(FieldTest::Date)
    } else if dt.is_relation() {
        compile_ref(field, dt, spec).map(FieldTest::Ref)
    } else {
        compile_json(field, dt, spec)
    }
}

fn invalid_operator(field: &str, spec: &FilterSpec, dt: DataType) -> FilterError {
    FilterError::InvalidOperator {
        field: field.to_string(),
        operator: spec.operator,
        data_type: dt,
    }
}

fn value_mismatch(field: &str, spec: &FilterSpec, reason: &str) -> FilterError {
    FilterError::TypeMismatch {
        field: field.to_string(),
        operator: spec.operator,
        reason: reason.to_string(),
    }
}

fn expect_str(field: &str, spec: &FilterSpec) -> Result<String, FilterError> {
    spec.value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| value_mismatch(field, spec, "expected a string"))
}

fn expect_list<'v>(
    field: &str,
    spec: &'v FilterSpec,
) -> Result<&'v [serde_json::Value], FilterError> {
    spec.value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| value_mismatch(field, spec, "expected a list"))
}

fn expect_pair<'v>(
    field: &str,
    spec: &'v FilterSpec,
) -> Result<(&'v serde_json::Value, &'v serde_json::Value), FilterError> {
    match spec.value.as_array().map(Vec::as_slice) {
        Some([low, high]) => Ok((low, high)),
        _ => Err(value_mismatch(field, spec, "expected [low, high]")),
    }
}

fn compile_text(field: &str, spec: &FilterSpec) -> Result<TextTest, FilterError> {
    let strings = |spec: &FilterSpec| -> Result<Vec<String>, FilterError> {
        expect_list(field, spec)?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| value_mismatch(field, spec, "expected a list of strings"))
            })
            .collect()
    };
    match spec.operator {
        FilterOperator::Is => Ok(TextTest::Is(expect_str(field, spec)?)),
        FilterOperator::IsNot => Ok(TextTest::IsNot(expect_str(field, spec)?)),
        FilterOperator::Contains => Ok(TextTest::Contains(expect_str(field, spec)?)),
        FilterOperator::NotContains => Ok(TextTest::NotContains(expect_str(field, spec)?)),
        FilterOperator::StartsWith => Ok(TextTest::StartsWith(expect_str(field, spec)?)),
        FilterOperator::EndsWith => Ok(TextTest::EndsWith(expect_str(field, spec)?)),
        FilterOperator::In => Ok(TextTest::In(strings(spec)?)),
        FilterOperator::NotIn => Ok(TextTest::NotIn(strings(spec)?)),
        _ => Err(invalid_operator(field, spec, DataType::Text)),
    }
}

fn compile_int(field: &str, spec: &FilterSpec) -> Result<NumberTest<i64>, FilterError> {
    let int = |raw: &serde_json::Value| -> Result<i64, FilterError> {
        raw.as_i64()
            .ok_or_else(|| value_mismatch(field, spec, "expected an integer"))
    };
    compile_number(field, spec, DataType::Number, int)
}

fn compile_float(field: &str, spec: &FilterSpec) -> Result<NumberTest<f64>, FilterError> {
    let float = |raw: &serde_json::Value| -> Result<f64, FilterError> {
        raw.as_f64()
            .ok_or_else(|| value_mismatch(field, spec, "expected a number"))
    };
    compile_number(field, spec, DataType::Float, float)
}

fn compile_number<T: Copy>(
    field: &str,
    spec: &FilterSpec,
    dt: DataType,
    parse: impl Fn(&serde_json::Value) -> Result<T, FilterError>,
) -> Result<NumberTest<T>, FilterError> {
    let list = || -> Result<Vec<T>, FilterError> {
        expect_list(field, spec)?.iter().map(&parse).collect()
    };
    let pair = || -> Result<(T, T), FilterError> {
        let (low, high) = expect_pair(field, spec)?;
        Ok((parse(low)?, parse(high)?))
    };
    match spec.operator {
        FilterOperator::Is => Ok(NumberTest::Is(parse(&spec.value)?)),
        FilterOperator::IsNot => Ok(NumberTest::IsNot(parse(&spec.value)?)),
        FilterOperator::LessThan => Ok(NumberTest::LessThan(parse(&spec.value)?)),
        FilterOperator::GreaterThan => Ok(NumberTest::GreaterThan(parse(&spec.value)?)),
        FilterOperator::Between => {
            let (low, high) = pair()?;
            Ok(NumberTest::Between(low, high))
        }
        FilterOperator::NotBetween => {
            let (low, high) = pair()?;
            Ok(NumberTest::NotBetween(low, high))
        }
        FilterOperator::In => Ok(NumberTest::In(list()?)),
        FilterOperator::NotIn => Ok(NumberTest::NotIn(list()?)),
        _ => Err(invalid_operator(field, spec, dt)),
    }
}

fn compile_bool(field: &str, dt: DataType, spec: &FilterSpec) -> Result<FieldTest, FilterError> {
    let operand = spec
        .value
        .as_bool()
        .ok_or_else(|| value_mismatch(field, spec, "expected a boolean"))?;
    match spec.operator {
        FilterOperator::Is => Ok(FieldTest::Bool {
            operand,
            negate: false,
        }),
        FilterOperator::IsNot => Ok(FieldTest::Bool {
            operand,
            negate: true,
        }),
        _ => Err(invalid_operator(field, spec, dt)),
    }
}

fn compile_date(
    field: &str,
    dt: DataType,
    spec: &FilterSpec,
    now: Timestamp,
) -> Result<DateTest, FilterError> {
    let operand = |raw: &serde_json::Value| parse_date_operand(field, dt, spec, raw, now);
    match spec.operator {
        FilterOperator::Is => Ok(DateTest::Is(operand(&spec.value)?)),
        FilterOperator::IsNot => Ok(DateTest::IsNot(operand(&spec.value)?)),
        FilterOperator::LessThan => Ok(DateTest::Before(operand(&spec.value)?)),
        FilterOperator::GreaterThan => Ok(DateTest::After(operand(&spec.value)?)),
        FilterOperator::Between => {
            let (low, high) = expect_pair(field, spec)?;
            Ok(DateTest::Between(operand(low)?, operand(high)?))
        }
        FilterOperator::NotBetween => {
            let (low, high) = expect_pair(field, spec)?;
            Ok(DateTest::NotBetween(operand(low)?, operand(high)?))
        }
        FilterOperator::In => Ok(DateTest::In(
            expect_list(field, spec)?
                .iter()
                .map(operand)
                .collect::<Result<_, _>>()?,
        )),
        FilterOperator::NotIn => Ok(DateTest::NotIn(
            expect_list(field, spec)?
                .iter()
                .map(operand)
                .collect::<Result<_, _>>()?,
        )),
        FilterOperator::InLast | FilterOperator::NotInLast => {
            let window = TimeWindow::from_wire(&spec.value)?;
            let (start, end) = window_bounds(window, now, true)?;
            Ok(DateTest::Window {
                start,
                end,
                negate: spec.operator == FilterOperator::NotInLast,
            })
        }
        FilterOperator::InNext | FilterOperator::NotInNext => {
            let window = TimeWindow::from_wire(&spec.value)?;
            let (start, end) = window_bounds(window, now, false)?;
            Ok(DateTest::Window {
                start,
                end,
                negate: spec.operator == FilterOperator::NotInNext,
            })
        }
        FilterOperator::InCalendarDay => Ok(calendar(TimeUnit::Day, now)),
        FilterOperator::InCalendarWeek => Ok(calendar(TimeUnit::Week, now)),
        FilterOperator::InCalendarMonth => Ok(calendar(TimeUnit::Month, now)),
        FilterOperator::InCalendarYear => Ok(calendar(TimeUnit::Year, now)),
        _ => Err(invalid_operator(field, spec, dt)),
    }
}

fn calendar(unit: TimeUnit, now: Timestamp) -> DateTest {
    DateTest::Calendar {
        unit,
        anchor: now.date_naive(),
    }
}

/// Coerce one date-family operand. Sentinels and bare `YYYY-MM-DD` values
/// become calendar days; full instants are kept exact for `date_time`
/// fields and truncated to their day for `date` fields.
fn parse_date_operand(
    field: &str,
    dt: DataType,
    spec: &FilterSpec,
    raw: &serde_json::Value,
    now: Timestamp,
) -> Result<DateOperand, FilterError> {
    let s = raw
        .as_str()
        .ok_or_else(|| value_mismatch(field, spec, "expected a date string"))?;
    if let Some(day) = date_sentinel(s, now.date_naive()) {
        return Ok(DateOperand::Day(day));
    }
    if let Some(day) = parse_date(s) {
        return Ok(DateOperand::Day(day));
    }
    if let Some(instant) = parse_datetime(s) {
        return Ok(match dt {
            DataType::Date => DateOperand::Day(instant.date_naive()),
            _ => DateOperand::Instant(instant),
        });
    }
    Err(value_mismatch(field, spec, "expected a date string"))
}

fn window_bounds(
    window: TimeWindow,
    now: Timestamp,
    backwards: bool,
) -> Result<(Timestamp, Timestamp), FilterError> {
    let invalid = || FilterError::InvalidTimeWindow {
        value: format!("{} {}", window.count, window.unit),
    };
    let shift = |t: Timestamp| -> Option<Timestamp> {
        match window.unit {
            TimeUnit::Day => {
                let days = Days::new(u64::from(window.count));
                if backwards {
                    t.checked_sub_days(days)
                } else {
                    t.checked_add_days(days)
                }
            }
            TimeUnit::Week => {
                let days = Days::new(u64::from(window.count) * 7);
                if backwards {
                    t.checked_sub_days(days)
                } else {
                    t.checked_add_days(days)
                }
            }
            TimeUnit::Month => {
                let months = Months::new(window.count);
                if backwards {
                    t.checked_sub_months(months)
                } else {
                    t.checked_add_months(months)
                }
            }
            TimeUnit::Year => {
                let months = Months::new(window.count.checked_mul(12)?);
                if backwards {
                    t.checked_sub_months(months)
                } else {
                    t.checked_add_months(months)
                }
            }
        }
    };
    let shifted = shift(now).ok_or_else(invalid)?;
    Ok(if backwards {
        (shifted, now)
    } else {
        (now, shifted)
    })
}

fn compile_ref(field: &str, dt: DataType, spec: &FilterSpec) -> Result<RefTest, FilterError> {
    let entity = |raw: &serde_json::Value| -> Result<EntityRef, FilterError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| value_mismatch(field, spec, "expected {type, id}"))?;
        let entity_type = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| value_mismatch(field, spec, "expected {type, id}"))?;
        let id = obj
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| value_mismatch(field, spec, "expected {type, id}"))?;
        Ok(EntityRef::new(entity_type, id))
    };
    let entities = || -> Result<Vec<EntityRef>, FilterError> {
        expect_list(field, spec)?.iter().map(entity).collect()
    };
    match spec.operator {
        FilterOperator::Is => Ok(RefTest::Is(entity(&spec.value)?)),
        FilterOperator::IsNot => Ok(RefTest::IsNot(entity(&spec.value)?)),
        FilterOperator::In => Ok(RefTest::In(entities()?)),
        FilterOperator::NotIn => Ok(RefTest::NotIn(entities()?)),
        FilterOperator::TypeIs => Ok(RefTest::TypeIs(expect_str(field, spec)?)),
        FilterOperator::TypeIsNot => Ok(RefTest::TypeIsNot(expect_str(field, spec)?)),
        FilterOperator::NameIs => Ok(RefTest::NameIs(expect_str(field, spec)?)),
        FilterOperator::NameContains => Ok(RefTest::NameContains(expect_str(field, spec)?)),
        FilterOperator::NameNotContains => Ok(RefTest::NameNotContains(expect_str(field, spec)?)),
        _ => Err(invalid_operator(field, spec, dt)),
    }
}

fn compile_json(field: &str, dt: DataType, spec: &FilterSpec) -> Result<FieldTest, FilterError> {
    match spec.operator {
        FilterOperator::Is => Ok(FieldTest::Json {
            operand: spec.value.clone(),
            negate: false,
        }),
        FilterOperator::IsNot => Ok(FieldTest::Json {
            operand: spec.value.clone(),
            negate: true,
        }),
        _ => Err(invalid_operator(field, spec, dt)),
    }
}

// ============================================================================
// PER-FAMILY EVALUATION
// ============================================================================

fn eval_text(test: &TextTest, value: Option<&Value>) -> bool {
    let text = value.and_then(|v| v.as_text());
    match test {
        TextTest::Is(operand) => text == Some(operand.as_str()),
        TextTest::IsNot(operand) => text != Some(operand.as_str()),
        TextTest::Contains(needle) => text.map_or(false, |t| t.contains(needle)),
        TextTest::NotContains(needle) => !text.map_or(false, |t| t.contains(needle)),
        TextTest::StartsWith(prefix) => text.map_or(false, |t| t.starts_with(prefix)),
        TextTest::EndsWith(suffix) => text.map_or(false, |t| t.ends_with(suffix)),
        TextTest::In(operands) => text.map_or(false, |t| operands.iter().any(|o| o == t)),
        TextTest::NotIn(operands) => !text.map_or(false, |t| operands.iter().any(|o| o == t)),
    }
}

fn eval_number<T: PartialOrd + Copy>(test: &NumberTest<T>, value: Option<T>) -> bool {
    match test {
        NumberTest::Is(operand) => value.map_or(false, |v| v == *operand),
        NumberTest::IsNot(operand) => !value.map_or(false, |v| v == *operand),
        NumberTest::LessThan(operand) => value.map_or(false, |v| v < *operand),
        NumberTest::GreaterThan(operand) => value.map_or(false, |v| v > *operand),
        NumberTest::Between(low, high) => value.map_or(false, |v| v >= *low && v <= *high),
        NumberTest::NotBetween(low, high) => !value.map_or(false, |v| v >= *low && v <= *high),
        NumberTest::In(operands) => value.map_or(false, |v| operands.iter().any(|o| *o == v)),
        NumberTest::NotIn(operands) => !value.map_or(false, |v| operands.iter().any(|o| *o == v)),
    }
}

/// Three-way comparison between a stored temporal value and an operand.
/// Calendar-day operands compare `date_time` values by their whole day.
fn date_cmp(value: &Value, operand: &DateOperand) -> Option<std::cmp::Ordering> {
    match (value, operand) {
        (Value::Date(d), DateOperand::Day(day)) => Some(d.cmp(day)),
        (Value::Date(d), DateOperand::Instant(t)) => Some(d.cmp(&t.date_naive())),
        (Value::DateTime(t), DateOperand::Day(day)) => Some(t.date_naive().cmp(day)),
        (Value::DateTime(t), DateOperand::Instant(i)) => Some(t.cmp(i)),
        _ => None,
    }
}

fn eval_date(test: &DateTest, value: Option<&Value>) -> bool {
    use std::cmp::Ordering;
    let cmp = |operand: &DateOperand| value.and_then(|v| date_cmp(v, operand));
    match test {
        DateTest::Is(operand) => cmp(operand) == Some(Ordering::Equal),
        DateTest::IsNot(operand) => cmp(operand) != Some(Ordering::Equal),
        DateTest::Before(operand) => cmp(operand) == Some(Ordering::Less),
        DateTest::After(operand) => cmp(operand) == Some(Ordering::Greater),
        DateTest::Between(low, high) => {
            cmp(low).map_or(false, |o| o != Ordering::Less)
                && cmp(high).map_or(false, |o| o != Ordering::Greater)
        }
        DateTest::NotBetween(low, high) => {
            !(cmp(low).map_or(false, |o| o != Ordering::Less)
                && cmp(high).map_or(false, |o| o != Ordering::Greater))
        }
        DateTest::In(operands) => operands.iter().any(|o| cmp(o) == Some(Ordering::Equal)),
        DateTest::NotIn(operands) => !operands.iter().any(|o| cmp(o) == Some(Ordering::Equal)),
        DateTest::Window { start, end, negate } => {
            let hit = match value {
                Some(Value::Date(d)) => *d >= start.date_naive() && *d <= end.date_naive(),
                Some(Value::DateTime(t)) => t >= start && t <= end,
                _ => false,
            };
            hit != *negate
        }
        DateTest::Calendar { unit, anchor } => {
            let day = match value {
                Some(Value::Date(d)) => *d,
                Some(Value::DateTime(t)) => t.date_naive(),
                _ => return false,
            };
            match unit {
                TimeUnit::Day => day == *anchor,
                TimeUnit::Week => day.iso_week() == anchor.iso_week(),
                TimeUnit::Month => day.year() == anchor.year() && day.month() == anchor.month(),
                TimeUnit::Year => day.year() == anchor.year(),
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use sgmock_core::{SchemaModel, ShotgridError};

    fn make_test_schema() -> SchemaModel {
        SchemaModel::builder()
            .field("Shot", "code", DataType::Text)
            .field("Shot", "sg_status_list", DataType::StatusList)
            .field("Shot", "sg_cut_in", DataType::Number)
            .field("Shot", "sg_frame_rate", DataType::Float)
            .field("Shot", "sg_omitted", DataType::Checkbox)
            .field("Shot", "due_date", DataType::Date)
            .field("Shot", "updated_at", DataType::DateTime)
            .entity_field("Shot", "project", &["Project"])
            .multi_entity_field("Shot", "assets", &["Asset"])
            .entity_field("Shot", "sg_sequence", &["Sequence"])
            .field("Project", "name", DataType::Text)
            .field("Asset", "code", DataType::Text)
            .build()
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn make_shot(store: &EntityStore, id: i64, status: &str) -> Record {
        let mut record = Record::new("Shot", id);
        record
            .fields
            .insert("code".to_string(), Value::text(format!("SH{:03}", id)));
        record
            .fields
            .insert("sg_status_list".to_string(), Value::text(status));
        store.insert(record.clone()).unwrap();
        record
    }

    fn compile_single(
        schema: &SchemaModel,
        store: &EntityStore,
        path: &str,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> ShotgridResult<CompiledFilter> {
        let spec = FilterSpec::new(path, operator, value).map_err(ShotgridError::from)?;
        FilterEvaluator::new(schema, store).compile("Shot", &[spec], LogicalOperator::And, now())
    }

    #[test]
    fn test_empty_filter_list_matches_everything() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let record = make_shot(&store, 1, "ip");
        let evaluator = FilterEvaluator::new(&schema, &store);
        let filter = evaluator
            .compile("Shot", &[], LogicalOperator::And, now())
            .unwrap();
        assert!(evaluator.matches(&filter, &record));
    }

    #[test]
    fn test_text_operators() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let record = make_shot(&store, 1, "ip");
        let evaluator = FilterEvaluator::new(&schema, &store);

        let cases = [
            (FilterOperator::Is, json!("SH001"), true),
            (FilterOperator::Is, json!("sh001"), false), // case-sensitive
            (FilterOperator::IsNot, json!("SH002"), true),
            (FilterOperator::Contains, json!("H00"), true),
            (FilterOperator::NotContains, json!("XX"), true),
            (FilterOperator::StartsWith, json!("SH"), true),
            (FilterOperator::EndsWith, json!("001"), true),
            (FilterOperator::In, json!(["SH001", "SH009"]), true),
            (FilterOperator::NotIn, json!(["SH009"]), true),
            (FilterOperator::In, json!(["SH009"]), false),
        ];
        for (operator, value, expected) in cases {
            let filter = compile_single(&schema, &store, "code", operator, value).unwrap();
            assert_eq!(
                evaluator.matches(&filter, &record),
                expected,
                "code {} failed",
                operator
            );
        }
    }

    #[test]
    fn test_number_operators() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut record = make_shot(&store, 1, "ip");
        record
            .fields
            .insert("sg_cut_in".to_string(), Value::Number(1001));
        let evaluator = FilterEvaluator::new(&schema, &store);

        let cases = [
            (FilterOperator::Is, json!(1001), true),
            (FilterOperator::LessThan, json!(1002), true),
            (FilterOperator::GreaterThan, json!(1001), false),
            (FilterOperator::Between, json!([1000, 1001]), true),
            (FilterOperator::NotBetween, json!([1002, 1010]), true),
            (FilterOperator::In, json!([1000, 1001]), true),
            (FilterOperator::NotIn, json!([1000]), true),
        ];
        for (operator, value, expected) in cases {
            let filter = compile_single(&schema, &store, "sg_cut_in", operator, value).unwrap();
            assert_eq!(
                evaluator.matches(&filter, &record),
                expected,
                "sg_cut_in {} failed",
                operator
            );
        }
    }

    #[test]
    fn test_float_field_accepts_integer_operand() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut record = make_shot(&store, 1, "ip");
        record
            .fields
            .insert("sg_frame_rate".to_string(), Value::Float(24.0));
        let evaluator = FilterEvaluator::new(&schema, &store);

        let filter =
            compile_single(&schema, &store, "sg_frame_rate", FilterOperator::Is, json!(24))
                .unwrap();
        assert!(evaluator.matches(&filter, &record));
    }

    #[test]
    fn test_id_builtin_filters_as_number() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let record = make_shot(&store, 7, "ip");
        let evaluator = FilterEvaluator::new(&schema, &store);

        let filter =
            compile_single(&schema, &store, "id", FilterOperator::Is, json!(7)).unwrap();
        assert!(evaluator.matches(&filter, &record));

        let filter =
            compile_single(&schema, &store, "id", FilterOperator::LessThan, json!(7)).unwrap();
        assert!(!evaluator.matches(&filter, &record));
    }

    #[test]
    fn test_missing_value_semantics() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let record = make_shot(&store, 1, "ip"); // no sg_cut_in set
        let evaluator = FilterEvaluator::new(&schema, &store);

        let positive =
            compile_single(&schema, &store, "sg_cut_in", FilterOperator::Is, json!(1)).unwrap();
        assert!(!evaluator.matches(&positive, &record));

        let negative =
            compile_single(&schema, &store, "sg_cut_in", FilterOperator::IsNot, json!(1)).unwrap();
        assert!(evaluator.matches(&negative, &record));
    }

    #[test]
    fn test_invalid_operator_rejected_at_compile() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let err =
            compile_single(&schema, &store, "code", FilterOperator::LessThan, json!("A"))
                .unwrap_err();
        assert!(matches!(
            err,
            ShotgridError::Filter(FilterError::InvalidOperator { .. })
        ));

        let err = compile_single(
            &schema,
            &store,
            "sg_omitted",
            FilterOperator::Contains,
            json!(true),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ShotgridError::Filter(FilterError::InvalidOperator { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_rejected_at_compile() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let err = compile_single(
            &schema,
            &store,
            "sg_cut_in",
            FilterOperator::LessThan,
            json!("abc"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ShotgridError::Filter(FilterError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected_at_compile() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let err = compile_single(
            &schema,
            &store,
            "sg_missing",
            FilterOperator::Is,
            json!("x"),
        )
        .unwrap_err();
        assert!(matches!(err, ShotgridError::Schema(_)));
    }

    #[test]
    fn test_date_relative_windows() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut record = make_shot(&store, 1, "ip");
        record.fields.insert(
            "due_date".to_string(),
            Value::Date(NaiveDate::from_ymd_opt(2025, 6, 12).unwrap()),
        );
        let evaluator = FilterEvaluator::new(&schema, &store);

        // 2025-06-12 is 3 days before the pinned now of 2025-06-15.
        let in_last_week = compile_single(
            &schema,
            &store,
            "due_date",
            FilterOperator::InLast,
            json!("7 days"),
        )
        .unwrap();
        assert!(evaluator.matches(&in_last_week, &record));

        let in_last_2_days = compile_single(
            &schema,
            &store,
            "due_date",
            FilterOperator::InLast,
            json!([2, "DAY"]),
        )
        .unwrap();
        assert!(!evaluator.matches(&in_last_2_days, &record));

        let not_in_last_2_days = compile_single(
            &schema,
            &store,
            "due_date",
            FilterOperator::NotInLast,
            json!([2, "DAY"]),
        )
        .unwrap();
        assert!(evaluator.matches(&not_in_last_2_days, &record));

        let in_next_week = compile_single(
            &schema,
            &store,
            "due_date",
            FilterOperator::InNext,
            json!("1 week"),
        )
        .unwrap();
        assert!(!evaluator.matches(&in_next_week, &record));
    }

    #[test]
    fn test_date_sentinels_resolve_against_injected_now() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut record = make_shot(&store, 1, "ip");
        record.fields.insert(
            "due_date".to_string(),
            Value::Date(NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()),
        );
        let evaluator = FilterEvaluator::new(&schema, &store);

        let yesterday = compile_single(
            &schema,
            &store,
            "due_date",
            FilterOperator::Is,
            json!("$yesterday"),
        )
        .unwrap();
        assert!(evaluator.matches(&yesterday, &record));

        let today = compile_single(
            &schema,
            &store,
            "due_date",
            FilterOperator::Is,
            json!("$today"),
        )
        .unwrap();
        assert!(!evaluator.matches(&today, &record));
    }

    #[test]
    fn test_calendar_buckets() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut record = make_shot(&store, 1, "ip");
        // Same ISO week as the pinned Sunday 2025-06-15, same month, same year.
        record.fields.insert(
            "due_date".to_string(),
            Value::Date(NaiveDate::from_ymd_opt(2025, 6, 9).unwrap()),
        );
        let evaluator = FilterEvaluator::new(&schema, &store);

        for (operator, expected) in [
            (FilterOperator::InCalendarDay, false),
            (FilterOperator::InCalendarWeek, true),
            (FilterOperator::InCalendarMonth, true),
            (FilterOperator::InCalendarYear, true),
        ] {
            let filter =
                compile_single(&schema, &store, "due_date", operator, json!(null)).unwrap();
            assert_eq!(
                evaluator.matches(&filter, &record),
                expected,
                "{} failed",
                operator
            );
        }
    }

    #[test]
    fn test_day_operand_spans_whole_day_for_datetime_field() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut record = make_shot(&store, 1, "ip");
        record.fields.insert(
            "updated_at".to_string(),
            Value::DateTime(Utc.with_ymd_and_hms(2025, 6, 14, 18, 30, 0).unwrap()),
        );
        let evaluator = FilterEvaluator::new(&schema, &store);

        let is_day = compile_single(
            &schema,
            &store,
            "updated_at",
            FilterOperator::Is,
            json!("2025-06-14"),
        )
        .unwrap();
        assert!(evaluator.matches(&is_day, &record));

        let before_day = compile_single(
            &schema,
            &store,
            "updated_at",
            FilterOperator::LessThan,
            json!("2025-06-15"),
        )
        .unwrap();
        assert!(evaluator.matches(&before_day, &record));

        let exact = compile_single(
            &schema,
            &store,
            "updated_at",
            FilterOperator::GreaterThan,
            json!("2025-06-14T18:00:00Z"),
        )
        .unwrap();
        assert!(evaluator.matches(&exact, &record));
    }

    #[test]
    fn test_entity_operators() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut project = Record::new("Project", 1);
        project
            .fields
            .insert("name".to_string(), Value::text("Film"));
        store.insert(project).unwrap();

        let mut record = make_shot(&store, 1, "ip");
        record.fields.insert(
            "project".to_string(),
            Value::Entity(EntityRef::new("Project", 1)),
        );
        let evaluator = FilterEvaluator::new(&schema, &store);

        let cases = [
            (FilterOperator::Is, json!({"type": "Project", "id": 1}), true),
            (FilterOperator::Is, json!({"type": "Project", "id": 2}), false),
            (FilterOperator::IsNot, json!({"type": "Project", "id": 2}), true),
            (FilterOperator::TypeIs, json!("Project"), true),
            (FilterOperator::TypeIsNot, json!("Project"), false),
            (
                FilterOperator::In,
                json!([{"type": "Project", "id": 1}, {"type": "Project", "id": 9}]),
                true,
            ),
            (FilterOperator::NotIn, json!([{"type": "Project", "id": 9}]), true),
            (FilterOperator::NameIs, json!("Film"), true),
            (FilterOperator::NameContains, json!("il"), true),
            (FilterOperator::NameNotContains, json!("zz"), true),
        ];
        for (operator, value, expected) in cases {
            let filter = compile_single(&schema, &store, "project", operator, value).unwrap();
            assert_eq!(
                evaluator.matches(&filter, &record),
                expected,
                "project {} failed",
                operator
            );
        }
    }

    #[test]
    fn test_multi_entity_membership() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut record = make_shot(&store, 1, "ip");
        record.fields.insert(
            "assets".to_string(),
            Value::MultiEntity(vec![
                EntityRef::new("Asset", 1),
                EntityRef::new("Asset", 2),
            ]),
        );
        let evaluator = FilterEvaluator::new(&schema, &store);

        let filter = compile_single(
            &schema,
            &store,
            "assets",
            FilterOperator::Is,
            json!({"type": "Asset", "id": 2}),
        )
        .unwrap();
        assert!(evaluator.matches(&filter, &record));

        let filter = compile_single(
            &schema,
            &store,
            "assets",
            FilterOperator::NotIn,
            json!([{"type": "Asset", "id": 3}]),
        )
        .unwrap();
        assert!(evaluator.matches(&filter, &record));
    }

    #[test]
    fn test_hop_matches_linked_field() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut project = Record::new("Project", 1);
        project
            .fields
            .insert("name".to_string(), Value::text("Film"));
        store.insert(project).unwrap();

        let mut record = make_shot(&store, 1, "ip");
        record.fields.insert(
            "project".to_string(),
            Value::Entity(EntityRef::new("Project", 1)),
        );
        let evaluator = FilterEvaluator::new(&schema, &store);

        let filter = compile_single(
            &schema,
            &store,
            "project.Project.name",
            FilterOperator::Is,
            json!("Film"),
        )
        .unwrap();
        assert!(evaluator.matches(&filter, &record));

        let filter = compile_single(
            &schema,
            &store,
            "project.Project.name",
            FilterOperator::Is,
            json!("Other"),
        )
        .unwrap();
        assert!(!evaluator.matches(&filter, &record));
    }

    #[test]
    fn test_hop_misses_are_false_not_errors() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let evaluator = FilterEvaluator::new(&schema, &store);

        // Null relation.
        let no_link = make_shot(&store, 1, "ip");
        let filter = compile_single(
            &schema,
            &store,
            "project.Project.name",
            FilterOperator::Is,
            json!("Film"),
        )
        .unwrap();
        assert!(!evaluator.matches(&filter, &no_link));

        // Dangling reference.
        let mut dangling = make_shot(&store, 2, "ip");
        dangling.fields.insert(
            "project".to_string(),
            Value::Entity(EntityRef::new("Project", 99)),
        );
        assert!(!evaluator.matches(&filter, &dangling));

        // Hop narrowed to a different linked type than the stored link.
        let mut wrong_type = make_shot(&store, 3, "ip");
        wrong_type.fields.insert(
            "project".to_string(),
            Value::Entity(EntityRef::new("Project", 1)),
        );
        let asset_hop = compile_single(
            &schema,
            &store,
            "assets.Asset.code",
            FilterOperator::Is,
            json!("TREE"),
        )
        .unwrap();
        assert!(!evaluator.matches(&asset_hop, &wrong_type));
    }

    #[test]
    fn test_hop_through_undefined_linked_type_compiles_to_never() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let evaluator = FilterEvaluator::new(&schema, &store);

        // Sequence is named in valid_types but not defined in the schema.
        let mut record = make_shot(&store, 1, "ip");
        record.fields.insert(
            "sg_sequence".to_string(),
            Value::Entity(EntityRef::new("Sequence", 5)),
        );
        let filter = compile_single(
            &schema,
            &store,
            "sg_sequence.Sequence.code",
            FilterOperator::Is,
            json!("SEQ01"),
        )
        .unwrap();
        assert!(!evaluator.matches(&filter, &record));
    }

    #[test]
    fn test_hop_through_non_relation_is_error() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let err = compile_single(
            &schema,
            &store,
            "code.Project.name",
            FilterOperator::Is,
            json!("x"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ShotgridError::Schema(sgmock_core::SchemaError::NotARelation { .. })
        ));
    }

    #[test]
    fn test_or_combinator() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let record = make_shot(&store, 1, "ip");
        let evaluator = FilterEvaluator::new(&schema, &store);

        let specs = vec![
            FilterSpec::new("sg_status_list", FilterOperator::Is, json!("cmpt")).unwrap(),
            FilterSpec::new("code", FilterOperator::Is, json!("SH001")).unwrap(),
        ];
        let any = evaluator
            .compile("Shot", &specs, LogicalOperator::Or, now())
            .unwrap();
        assert!(evaluator.matches(&any, &record));

        let all = evaluator
            .compile("Shot", &specs, LogicalOperator::And, now())
            .unwrap();
        assert!(!evaluator.matches(&all, &record));
    }

    #[test]
    fn test_hop_to_tombstoned_record_is_false() {
        let schema = make_test_schema();
        let store = EntityStore::new();
        let mut project = Record::new("Project", 1);
        project
            .fields
            .insert("name".to_string(), Value::text("Film"));
        project.deleted = true;
        store.insert(project).unwrap();

        let mut record = make_shot(&store, 1, "ip");
        record.fields.insert(
            "project".to_string(),
            Value::Entity(EntityRef::new("Project", 1)),
        );
        let evaluator = FilterEvaluator::new(&schema, &store);
        let filter = compile_single(
            &schema,
            &store,
            "project.Project.name",
            FilterOperator::Is,
            json!("Film"),
        )
        .unwrap();
        assert!(!evaluator.matches(&filter, &record));
    }
}
