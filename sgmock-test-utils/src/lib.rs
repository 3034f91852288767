//! sgmock Test Utilities
//!
//! Centralized test infrastructure for the sgmock workspace:
//! - The standard production-tracking schema used across tests
//! - Seeded backends with a small, linked project world
//! - Small helpers for building wire-shaped data

// Re-export the backend and core types for convenience
pub use sgmock_core::{
    DataType, EntityId, EntityRef, FilterOperator, FilterSpec, LogicalOperator, Record,
    SchemaModel, ShotgridError, ShotgridResult, Timestamp, Value,
};
pub use sgmock_store::{EntityStore, FindOptions, MockShotgrid};

use chrono::Days;
use std::sync::Arc;

/// The standard fixture schema: a production-tracking world with projects,
/// shots, assets, tasks, versions, and users, wired together the way the
/// real service wires them.
pub fn production_schema() -> Arc<SchemaModel> {
    Arc::new(
        SchemaModel::builder()
            .field("Project", "name", DataType::Text)
            .field("Project", "sg_description", DataType::Text)
            .field("Shot", "code", DataType::Text)
            .field("Shot", "description", DataType::Text)
            .field_with_default("Shot", "sg_status_list", DataType::StatusList, Value::text("wtg"))
            .entity_field("Shot", "project", &["Project"])
            .field("Shot", "sg_cut_in", DataType::Number)
            .field("Shot", "sg_cut_out", DataType::Number)
            .field("Shot", "image", DataType::Image)
            .multi_entity_field("Shot", "assets", &["Asset"])
            .field("Asset", "code", DataType::Text)
            .field("Asset", "sg_asset_type", DataType::Text)
            .entity_field("Asset", "project", &["Project"])
            .field("Task", "content", DataType::Text)
            .field_with_default("Task", "sg_status_list", DataType::StatusList, Value::text("wtg"))
            .entity_field("Task", "entity", &["Shot", "Asset"])
            .multi_entity_field("Task", "task_assignees", &["HumanUser"])
            .entity_field("Task", "project", &["Project"])
            .field("Task", "due_date", DataType::Date)
            .field("HumanUser", "name", DataType::Text)
            .field("HumanUser", "login", DataType::Text)
            .field("HumanUser", "email", DataType::Text)
            .field("Version", "code", DataType::Text)
            .entity_field("Version", "entity", &["Shot", "Asset"])
            .entity_field("Version", "user", &["HumanUser"])
            .entity_field("Version", "project", &["Project"])
            .field_with_default("Version", "sg_status_list", DataType::StatusList, Value::text("rev"))
            .field("Version", "created_at", DataType::DateTime)
            .build(),
    )
}

/// Convert a `json!` object literal into the wire data map mutations take.
pub fn data(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// An empty backend over the fixture schema with a pinned clock.
pub fn empty_backend(now: Timestamp) -> MockShotgrid {
    MockShotgrid::with_fixed_clock(production_schema(), now)
}

/// A backend seeded with one project, two users, three shots, two assets,
/// linked tasks, and versions spread around `now`.
///
/// Ids are assigned in creation order, so Shot ids are 1..=3 with codes
/// SH010/SH020/SH030, and so on per type.
pub fn seeded_backend(now: Timestamp) -> MockShotgrid {
    let sg = empty_backend(now);
    let project = sg
        .create("Project", &data(serde_json::json!({"name": "Hyperion"})))
        .expect("seed project");
    let project_ref = serde_json::json!({"type": "Project", "id": project.id});

    let alice = sg
        .create(
            "HumanUser",
            &data(serde_json::json!({
                "name": "Alice Reyes", "login": "alice", "email": "alice@studio.example"
            })),
        )
        .expect("seed user");
    sg.create(
        "HumanUser",
        &data(serde_json::json!({
            "name": "Ben Okafor", "login": "ben", "email": "ben@studio.example"
        })),
    )
    .expect("seed user");

    for (code, status, cut_in, cut_out) in [
        ("SH010", "ip", 1001, 1090),
        ("SH020", "cmpt", 1001, 1120),
        ("SH030", "wtg", 1005, 1060),
    ] {
        sg.create(
            "Shot",
            &data(serde_json::json!({
                "code": code,
                "sg_status_list": status,
                "project": project_ref,
                "sg_cut_in": cut_in,
                "sg_cut_out": cut_out,
            })),
        )
        .expect("seed shot");
    }

    for (code, asset_type) in [("TREE", "Prop"), ("HERO_CAR", "Vehicle")] {
        sg.create(
            "Asset",
            &data(serde_json::json!({
                "code": code, "sg_asset_type": asset_type, "project": project_ref
            })),
        )
        .expect("seed asset");
    }

    let day = |offset_back: u64| {
        now.date_naive()
            .checked_sub_days(Days::new(offset_back))
            .expect("seed date in range")
            .format("%Y-%m-%d")
            .to_string()
    };
    for (content, shot_id, status, due_back) in [
        ("Animate SH010", 1, "ip", 2u64),
        ("Comp SH020", 2, "fin", 30),
        ("Layout SH030", 3, "wtg", 0),
    ] {
        sg.create(
            "Task",
            &data(serde_json::json!({
                "content": content,
                "sg_status_list": status,
                "entity": {"type": "Shot", "id": shot_id},
                "task_assignees": [{"type": "HumanUser", "id": alice.id}],
                "project": project_ref,
                "due_date": day(due_back),
            })),
        )
        .expect("seed task");
    }

    for (code, shot_id, days_back) in [("SH010_v001", 1, 1u64), ("SH020_v004", 2, 40)] {
        let created_at = now
            .checked_sub_days(Days::new(days_back))
            .expect("seed datetime in range");
        sg.create(
            "Version",
            &data(serde_json::json!({
                "code": code,
                "entity": {"type": "Shot", "id": shot_id},
                "user": {"type": "HumanUser", "id": alice.id},
                "project": project_ref,
                "created_at": created_at.to_rfc3339(),
            })),
        )
        .expect("seed version");
    }

    sg
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_seeded_backend_counts() {
        let sg = seeded_backend(now());
        assert_eq!(sg.store().count("Project"), 1);
        assert_eq!(sg.store().count("HumanUser"), 2);
        assert_eq!(sg.store().count("Shot"), 3);
        assert_eq!(sg.store().count("Asset"), 2);
        assert_eq!(sg.store().count("Task"), 3);
        assert_eq!(sg.store().count("Version"), 2);
    }

    #[test]
    fn test_seeded_links_resolve() {
        let sg = seeded_backend(now());
        let task = sg
            .find_one(
                "Task",
                &[FilterSpec::new("content", FilterOperator::Is, json!("Animate SH010")).unwrap()],
                &FindOptions {
                    fields: vec!["entity.Shot.code".to_string()],
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(task["entity.Shot.code"], json!("SH010"));
    }

    #[test]
    fn test_version_defaults_applied() {
        let sg = seeded_backend(now());
        let version = sg
            .find_one(
                "Version",
                &[FilterSpec::new("code", FilterOperator::Is, json!("SH010_v001")).unwrap()],
                &FindOptions::default(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(version["sg_status_list"], json!("rev"));
    }
}
