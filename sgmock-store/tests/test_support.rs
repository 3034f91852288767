//! Shared fixtures for sgmock-store integration tests.

use sgmock_core::{DataType, SchemaModel, Timestamp, Value};
use sgmock_store::MockShotgrid;
use std::sync::Arc;

/// Small production-tracking schema: projects, shots, tasks, users.
pub fn test_schema() -> Arc<SchemaModel> {
    Arc::new(
        SchemaModel::builder()
            .field("Project", "name", DataType::Text)
            .field("Shot", "code", DataType::Text)
            .field("Shot", "description", DataType::Text)
            .field_with_default("Shot", "sg_status_list", DataType::StatusList, Value::text("wtg"))
            .entity_field("Shot", "project", &["Project"])
            .field("Shot", "sg_cut_in", DataType::Number)
            .field("Shot", "due_date", DataType::Date)
            .field("Task", "content", DataType::Text)
            .field_with_default("Task", "sg_status_list", DataType::StatusList, Value::text("wtg"))
            .entity_field("Task", "entity", &["Shot", "Asset"])
            .entity_field("Task", "project", &["Project"])
            .field("Asset", "code", DataType::Text)
            .build(),
    )
}

/// Backend over the test schema with a pinned evaluation clock.
pub fn backend_at(now: Timestamp) -> MockShotgrid {
    MockShotgrid::with_fixed_clock(test_schema(), now)
}

/// Convert a `json!` object literal into the wire data map mutations take.
pub fn data(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}
