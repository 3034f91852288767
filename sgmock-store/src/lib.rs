//! sgmock Store - Entity Store and Query Engine
//!
//! The in-memory mock backend: a schema-driven record store with a
//! ShotGrid-compatible filter/query engine, validated mutations, soft
//! delete, and non-transactional batches. [`MockShotgrid`] bundles the
//! pieces behind the same surface the real API client exposes, so
//! application logic can run against memory instead of the network.

pub mod batch;
pub mod mutation;
pub mod predicate;
pub mod query;
pub mod store;

pub use batch::{BatchItemError, BatchItemResult, BatchOutput, BatchProcessor};
pub use mutation::MutationEngine;
pub use predicate::{CompiledFilter, FilterEvaluator};
pub use query::{FindOptions, QueryEngine, SummarizeOptions, SummaryGroup, SummaryResult};
pub use store::EntityStore;

use chrono::Utc;
use sgmock_core::{
    BatchRequest, EntityId, FilterSpec, ProjectedRecord, Record, SchemaModel, ShotgridResult,
    SummaryField, Timestamp,
};
use std::sync::Arc;

/// Evaluation clock for the facade. Tests pin it so date filters are
/// deterministic; the engines themselves never read wall-clock time.
#[derive(Debug, Clone)]
enum Clock {
    System,
    Fixed(Timestamp),
}

impl Clock {
    fn now(&self) -> Timestamp {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }
}

/// The assembled mock backend.
///
/// Owns the schema handle, the record store, and the evaluation clock:
/// explicit ownership, no process-global state. Every method is safe to
/// call from concurrent callers; locking lives inside [`EntityStore`].
#[derive(Debug)]
pub struct MockShotgrid {
    schema: Arc<SchemaModel>,
    store: EntityStore,
    clock: Clock,
}

impl MockShotgrid {
    pub fn new(schema: Arc<SchemaModel>) -> Self {
        Self {
            schema,
            store: EntityStore::new(),
            clock: Clock::System,
        }
    }

    /// Backend whose date filters evaluate against a pinned instant.
    pub fn with_fixed_clock(schema: Arc<SchemaModel>, now: Timestamp) -> Self {
        Self {
            schema,
            store: EntityStore::new(),
            clock: Clock::Fixed(now),
        }
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn create(
        &self,
        entity_type: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> ShotgridResult<Record> {
        MutationEngine::new(&self.schema, &self.store).create(entity_type, data)
    }

    pub fn update(
        &self,
        entity_type: &str,
        id: EntityId,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> ShotgridResult<Record> {
        MutationEngine::new(&self.schema, &self.store).update(entity_type, id, data)
    }

    pub fn delete(&self, entity_type: &str, id: EntityId) -> ShotgridResult<bool> {
        MutationEngine::new(&self.schema, &self.store).delete(entity_type, id)
    }

    pub fn revive(&self, entity_type: &str, id: EntityId) -> ShotgridResult<bool> {
        MutationEngine::new(&self.schema, &self.store).revive(entity_type, id)
    }

    pub fn find(
        &self,
        entity_type: &str,
        filters: &[FilterSpec],
        options: &FindOptions,
    ) -> ShotgridResult<Vec<ProjectedRecord>> {
        QueryEngine::new(&self.schema, &self.store).find(
            entity_type,
            filters,
            options,
            self.clock.now(),
        )
    }

    pub fn find_one(
        &self,
        entity_type: &str,
        filters: &[FilterSpec],
        options: &FindOptions,
    ) -> ShotgridResult<Option<ProjectedRecord>> {
        QueryEngine::new(&self.schema, &self.store).find_one(
            entity_type,
            filters,
            options,
            self.clock.now(),
        )
    }

    pub fn summarize(
        &self,
        entity_type: &str,
        filters: &[FilterSpec],
        summary_fields: &[SummaryField],
        options: &SummarizeOptions,
    ) -> ShotgridResult<SummaryResult> {
        QueryEngine::new(&self.schema, &self.store).summarize(
            entity_type,
            filters,
            summary_fields,
            options,
            self.clock.now(),
        )
    }

    pub fn batch(&self, requests: &[BatchRequest]) -> Vec<BatchItemResult> {
        BatchProcessor::new(&self.schema, &self.store).run(requests)
    }
}

// =============================================================================
// TESTS
// =============================================================================
