//! Remote store client
//!
//! The durable, account-scoped backend shared by every device of a user.
//! Writes are upserts on `(identity, pass_id)`; a successful call returns
//! `Ok(())` and any network or validation failure comes back as
//! [`TrackerError::Remote`](crate::TrackerError::Remote).
//!
//! Two backends ship with the crate:
//! - [`MemoryRemote`]: in-process, shared between sessions through an `Arc`
//! - [`StorageRemote`]: the account tables of a redb [`Storage`](crate::Storage)
//!
//! Both can be attached to a [`FeedHub`](crate::FeedHub), in which case every
//! successful write publishes a change signal for the written record type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TrackerResult;
use crate::types::{ConquestRecord, Identity, PassId};

mod durable;
mod memory;

pub use durable::StorageRemote;
pub use memory::MemoryRemote;

/// Account-scoped persistence of conquests and favorites
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_conquests(&self, identity: &Identity) -> TrackerResult<Vec<ConquestRecord>>;

    /// Insert or overwrite the record for `(identity, record.pass_id)`
    async fn upsert_conquest(&self, identity: &Identity, record: &ConquestRecord)
        -> TrackerResult<()>;

    async fn delete_conquest(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()>;

    async fn list_favorites(&self, identity: &Identity) -> TrackerResult<Vec<PassId>>;

    async fn upsert_favorite(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()>;

    async fn delete_favorite(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()>;
}

/// Server-side rules applied to every stored record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Photos beyond this count are dropped on write
    pub max_photos_per_conquest: Option<usize>,
}

impl BackendConfig {
    /// The record as the backend will store it
    pub(crate) fn enforce(&self, record: &ConquestRecord) -> ConquestRecord {
        let mut stored = record.clone();
        if let Some(max) = self.max_photos_per_conquest {
            stored.photos.truncate(max);
        }
        stored
    }
}
