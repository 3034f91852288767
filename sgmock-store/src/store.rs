//! Entity store
//!
//! Owns every record, keyed by `(entity_type, id)`, and the per-type id
//! counters. One coarse `RwLock` serializes all access: mutating calls take
//! the write guard, readers copy a consistent snapshot under the read guard
//! and then work lock-free. Callers never manage locking themselves.

use sgmock_core::{EntityId, Record, ShotgridResult, StorageError};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct StoreInner {
    /// entity type -> id -> record, tombstones included.
    tables: HashMap<String, BTreeMap<EntityId, Record>>,
    /// Highest id ever issued or seen per entity type.
    next_ids: HashMap<String, EntityId>,
}

/// In-memory record store with soft-delete tracking.
#[derive(Debug, Default)]
pub struct EntityStore {
    inner: RwLock<StoreInner>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id for `entity_type`. Strictly increasing per type;
    /// ids are never reissued, not even after delete and revive.
    pub fn allocate_id(&self, entity_type: &str) -> EntityId {
        let mut inner = self.inner.write().unwrap();
        let next = inner.next_ids.entry(entity_type.to_string()).or_insert(0);
        *next += 1;
        *next
    }

    /// Insert a record under its `(entity_type, id)` key.
    ///
    /// Accepts pre-assigned ids (seed data); the id counter is bumped past
    /// them so they can never be reissued.
    pub fn insert(&self, record: Record) -> ShotgridResult<()> {
        let mut inner = self.inner.write().unwrap();
        let next = inner.next_ids.entry(record.entity_type.clone()).or_insert(0);
        if record.id > *next {
            *next = record.id;
        }
        let table = inner.tables.entry(record.entity_type.clone()).or_default();
        if table.contains_key(&record.id) {
            return Err(StorageError::InsertFailed {
                entity_type: record.entity_type.clone(),
                id: record.id,
                reason: "already exists".to_string(),
            }
            .into());
        }
        table.insert(record.id, record);
        Ok(())
    }

    /// Fetch a record by key, tombstoned or not.
    pub fn get(&self, entity_type: &str, id: EntityId) -> Option<Record> {
        let inner = self.inner.read().unwrap();
        inner.tables.get(entity_type)?.get(&id).cloned()
    }

    /// Replace an existing record wholesale. The `(entity_type, id)` key
    /// must already be present.
    pub fn replace(&self, record: Record) -> ShotgridResult<()> {
        let mut inner = self.inner.write().unwrap();
        let slot = inner
            .tables
            .get_mut(&record.entity_type)
            .and_then(|table| table.get_mut(&record.id))
            .ok_or_else(|| StorageError::NotFound {
                entity_type: record.entity_type.clone(),
                id: record.id,
            })?;
        *slot = record;
        Ok(())
    }

    /// Run `f` against a record under the write guard. Returns `None` when
    /// the key does not exist. This is the atomic read-modify-write used by
    /// update/delete/revive.
    pub fn modify<R>(
        &self,
        entity_type: &str,
        id: EntityId,
        f: impl FnOnce(&mut Record) -> R,
    ) -> Option<R> {
        let mut inner = self.inner.write().unwrap();
        inner
            .tables
            .get_mut(entity_type)
            .and_then(|table| table.get_mut(&id))
            .map(f)
    }

    /// Consistent copy of every record of a type, tombstones included,
    /// sorted by ascending id. Callers filter deleted state explicitly.
    pub fn snapshot(&self, entity_type: &str) -> Vec<Record> {
        let inner = self.inner.read().unwrap();
        inner
            .tables
            .get(entity_type)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of stored records of a type, tombstones included.
    pub fn count(&self, entity_type: &str) -> usize {
        let inner = self.inner.read().unwrap();
        inner.tables.get(entity_type).map_or(0, |table| table.len())
    }

    /// Drop all records and id counters.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.tables.clear();
        inner.next_ids.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Ids are strictly increasing per type regardless of allocation count.
        #[test]
        fn prop_allocate_id_monotonic(count in 1usize..50) {
            let store = EntityStore::new();
            let mut last = 0;
            for _ in 0..count {
                let id = store.allocate_id("Shot");
                prop_assert!(id > last);
                last = id;
            }
        }

        /// Snapshots are always sorted by id.
        #[test]
        fn prop_snapshot_sorted(ids in proptest::collection::btree_set(1i64..1000, 0..20)) {
            let store = EntityStore::new();
            for id in &ids {
                store.insert(Record::new("Shot", *id)).unwrap();
            }
            let snapshot = store.snapshot("Shot");
            let got: Vec<i64> = snapshot.iter().map(|r| r.id).collect();
            let expected: Vec<i64> = ids.into_iter().collect();
            prop_assert_eq!(got, expected);
        }
    }
}
