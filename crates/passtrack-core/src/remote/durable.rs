//! Remote store backed by the redb account tables

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{BackendConfig, RemoteStore};
use crate::error::TrackerResult;
use crate::feed::FeedHub;
use crate::storage::Storage;
use crate::types::{ConquestRecord, Identity, PassId, RecordType};

/// Durable remote store on top of [`Storage`]
///
/// Survives process restarts, so separate runs of the CLI observe each
/// other's writes for the same account.
#[derive(Clone)]
pub struct StorageRemote {
    storage: Storage,
    config: BackendConfig,
    feed: Option<Arc<FeedHub>>,
}

impl StorageRemote {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            config: BackendConfig::default(),
            feed: None,
        }
    }

    pub fn with_config(mut self, config: BackendConfig) -> Self {
        self.config = config;
        self
    }

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
impl RemoteStore for StorageRemote {
    async fn list_conquests(&self, identity: &Identity) -> TrackerResult<Vec<ConquestRecord>> {
        self.storage.list_account_conquests(identity)
    }

    async fn upsert_conquest(
        &self,
        identity: &Identity,
        record: &ConquestRecord,
    ) -> TrackerResult<()> {
        self.storage
            .put_account_conquest(identity, &self.config.enforce(record))?;
        self.notify(identity, RecordType::Conquests);
        Ok(())
    }

    async fn delete_conquest(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        let existed = self.storage.remove_account_conquest(identity, pass_id)?;
        debug!(%identity, %pass_id, existed, "Conquest deleted");
        self.notify(identity, RecordType::Conquests);
        Ok(())
    }

    async fn list_favorites(&self, identity: &Identity) -> TrackerResult<Vec<PassId>> {
        self.storage.list_account_favorites(identity)
    }

    async fn upsert_favorite(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        self.storage.put_account_favorite(identity, pass_id)?;
        self.notify(identity, RecordType::Favorites);
        Ok(())
    }

    async fn delete_favorite(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        let existed = self.storage.remove_account_favorite(identity, pass_id)?;
        debug!(%identity, %pass_id, existed, "Favorite deleted");
        self.notify(identity, RecordType::Favorites);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_storage_remote_roundtrip_with_limits() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("remote.redb")).unwrap();
        let remote = StorageRemote::new(storage).with_config(BackendConfig {
            max_photos_per_conquest: Some(2),
        });
        let alice = Identity::new("alice").unwrap();
        let pass = PassId::new("san-bernardino").unwrap();

        let record = ConquestRecord::completed_today(pass.clone())
            .with_photos(vec!["1".into(), "2".into(), "3".into()]);
        remote.upsert_conquest(&alice, &record).await.unwrap();

        let stored = remote.list_conquests(&alice).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].photos.len(), 2);

        remote.delete_conquest(&alice, &pass).await.unwrap();
        assert!(remote.list_conquests(&alice).await.unwrap().is_empty());
    }
}
