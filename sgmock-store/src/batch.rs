//! Batch processor
//!
//! Runs a heterogeneous list of mutations strictly in order. Items are
//! independent: a failure is captured in that item's slot and the batch
//! keeps going. There is no rollback, matching the non-transactional
//! semantics of the service being mocked.

use crate::mutation::MutationEngine;
use crate::store::EntityStore;
use sgmock_core::{BatchRequest, Record, SchemaModel, ShotgridError};
use thiserror::Error;
use tracing::warn;

/// Successful outcome of one batch item.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutput {
    Created(Record),
    Updated(Record),
    Deleted(bool),
}

/// Failed outcome of one batch item, tagged with its position.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Batch item {index} failed: {error}")]
pub struct BatchItemError {
    pub index: usize,
    #[source]
    pub error: ShotgridError,
}

pub type BatchItemResult = Result<BatchOutput, BatchItemError>;

pub struct BatchProcessor<'a> {
    mutations: MutationEngine<'a>,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(schema: &'a SchemaModel, store: &'a EntityStore) -> Self {
        Self {
            mutations: MutationEngine::new(schema, store),
        }
    }

    /// Execute `requests` in order; the result list is index-aligned with
    /// the input.
    pub fn run(&self, requests: &[BatchRequest]) -> Vec<BatchItemResult> {
        requests
            .iter()
            .enumerate()
            .map(|(index, request)| {
                self.run_one(request).map_err(|error| {
                    warn!(index, %error, "batch item failed");
                    BatchItemError { index, error }
                })
            })
            .collect()
    }

    fn run_one(&self, request: &BatchRequest) -> Result<BatchOutput, ShotgridError> {
        match request {
            BatchRequest::Create { entity_type, data } => self
                .mutations
                .create(entity_type, data)
                .map(BatchOutput::Created),
            BatchRequest::Update {
                entity_type,
                entity_id,
                data,
            } => self
                .mutations
                .update(entity_type, *entity_id, data)
                .map(BatchOutput::Updated),
            BatchRequest::Delete {
                entity_type,
                entity_id,
            } => self
                .mutations
                .delete(entity_type, *entity_id)
                .map(BatchOutput::Deleted),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
