//! Ephemeral local fallback store

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::TrackerResult;
use crate::types::{ConquestRecord, PassId};

use super::LocalFallbackStore;

/// Local fallback store that lives only as long as the process
#[derive(Default)]
pub struct MemoryLocalStore {
    records: Mutex<BTreeMap<PassId, ConquestRecord>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `records` already stored
    pub fn with_records(records: impl IntoIterator<Item = ConquestRecord>) -> Self {
        let store = Self::new();
        store
            .records
            .lock()
            .extend(records.into_iter().map(|r| (r.pass_id.clone(), r)));
        store
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LocalFallbackStore for MemoryLocalStore {
    fn load(&self) -> TrackerResult<Vec<ConquestRecord>> {
        Ok(self.records.lock().values().cloned().collect())
    }

    fn save(&self, records: &[ConquestRecord]) -> TrackerResult<()> {
        let mut stored = self.records.lock();
        stored.clear();
        stored.extend(records.iter().map(|r| (r.pass_id.clone(), r.clone())));
        Ok(())
    }

    fn upsert_one(&self, record: &ConquestRecord) -> TrackerResult<()> {
        self.records
            .lock()
            .insert(record.pass_id.clone(), record.clone());
        Ok(())
    }

    fn delete_one(&self, pass_id: &PassId) -> TrackerResult<()> {
        self.records.lock().remove(pass_id);
        Ok(())
    }
}
