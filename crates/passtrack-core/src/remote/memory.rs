//! In-process remote store

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{BackendConfig, RemoteStore};
use crate::error::TrackerResult;
use crate::feed::FeedHub;
use crate::types::{ConquestRecord, Identity, PassId, RecordType};

/// Remote store kept entirely in memory
///
/// Share one instance (behind an `Arc`) between several reconcilers to model
/// multiple devices signed in to the same backend.
#[derive(Default)]
pub struct MemoryRemote {
    config: BackendConfig,
    feed: Option<Arc<FeedHub>>,
    conquests: RwLock<HashMap<Identity, BTreeMap<PassId, ConquestRecord>>>,
    favorites: RwLock<HashMap<Identity, BTreeSet<PassId>>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: BackendConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish a change signal on `feed` after every successful write
    pub fn with_feed(mut self, feed: Arc<FeedHub>) -> Self {
        self.feed = Some(feed);
        self
    }

    fn notify(&self, identity: &Identity, record_type: RecordType) {
        if let Some(feed) = &self.feed {
            feed.publish(identity, record_type);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list_conquests(&self, identity: &Identity) -> TrackerResult<Vec<ConquestRecord>> {
        Ok(self
            .conquests
            .read()
            .get(identity)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_conquest(
        &self,
        identity: &Identity,
        record: &ConquestRecord,
    ) -> TrackerResult<()> {
        let stored = self.config.enforce(record);
        self.conquests
            .write()
            .entry(identity.clone())
            .or_default()
            .insert(stored.pass_id.clone(), stored);
        debug!(%identity, pass_id = %record.pass_id, "Conquest upserted");
        self.notify(identity, RecordType::Conquests);
        Ok(())
    }

    async fn delete_conquest(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        if let Some(records) = self.conquests.write().get_mut(identity) {
            records.remove(pass_id);
        }
        debug!(%identity, %pass_id, "Conquest deleted");
        self.notify(identity, RecordType::Conquests);
        Ok(())
    }

    async fn list_favorites(&self, identity: &Identity) -> TrackerResult<Vec<PassId>> {
        Ok(self
            .favorites
            .read()
            .get(identity)
            .map(|passes| passes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_favorite(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        self.favorites
            .write()
            .entry(identity.clone())
            .or_default()
            .insert(pass_id.clone());
        self.notify(identity, RecordType::Favorites);
        Ok(())
    }

    async fn delete_favorite(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        if let Some(passes) = self.favorites.write().get_mut(identity) {
            passes.remove(pass_id);
        }
        self.notify(identity, RecordType::Favorites);
        Ok(())
    }
}
