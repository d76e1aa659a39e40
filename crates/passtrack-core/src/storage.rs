//! Persistent storage using redb.
//!
//! One database file holds two independent sets of tables:
//! - the local fallback store (conquests of the anonymous user on this device)
//! - account tables keyed by `(identity, pass_id)`, used by
//!   [`StorageRemote`](crate::remote::StorageRemote) as a durable backend
//!
//! Records are stored as JSON so the on-disk shape matches what the remote
//! store exchanges.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;

use crate::error::{TrackerError, TrackerResult};
use crate::types::{ConquestRecord, Identity, PassId};

// Submodules
mod accounts;
mod local;
mod memory;

use accounts::{ACCOUNT_CONQUESTS_TABLE, ACCOUNT_FAVORITES_TABLE};
use local::LOCAL_CONQUESTS_TABLE;

pub use memory::MemoryLocalStore;

/// Separates identity and pass id in composite account keys.
///
/// Neither half may contain control characters, so a prefix scan on
/// `identity + KEY_SEP` matches exactly that identity's rows.
const KEY_SEP: char = '\u{1f}';

/// Device-local persistence used when no identity is signed in
///
/// Holds no favorites: without an account they only live in
/// memory for the session.
pub trait LocalFallbackStore: Send + Sync {
    /// All locally stored conquests
    fn load(&self) -> TrackerResult<Vec<ConquestRecord>>;

    /// Replace the stored set with `records`
    fn save(&self, records: &[ConquestRecord]) -> TrackerResult<()>;

    /// Insert or overwrite the record for `record.pass_id`
    fn upsert_one(&self, record: &ConquestRecord) -> TrackerResult<()>;

    /// Remove the record for `pass_id`, if any
    fn delete_one(&self, pass_id: &PassId) -> TrackerResult<()>;
}

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// Creates the parent directory and every table if missing.
    pub fn new(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LOCAL_CONQUESTS_TABLE)?;
            let _ = write_txn.open_table(ACCOUNT_CONQUESTS_TABLE)?;
            let _ = write_txn.open_table(ACCOUNT_FAVORITES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn db(&self) -> &Database {
        &self.db
    }
}

fn account_prefix(identity: &Identity) -> String {
    format!("{}{}", identity, KEY_SEP)
}

fn account_key(identity: &Identity, pass_id: &PassId) -> String {
    format!("{}{}{}", identity, KEY_SEP, pass_id)
}

/// Decode every value whose key starts with `identity`'s prefix
fn scan_account<T: DeserializeOwned>(
    db: &Database,
    table: TableDefinition<'static, &'static str, &'static [u8]>,
    identity: &Identity,
) -> TrackerResult<Vec<T>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(table)?;
    let prefix = account_prefix(identity);

    let mut out = Vec::new();
    for entry in table.range(prefix.as_str()..)? {
        let (key, value) = entry?;
        if !key.value().starts_with(&prefix) {
            break;
        }
        out.push(serde_json::from_slice(value.value())?);
    }
    Ok(out)
}

fn decode_record(bytes: &[u8]) -> TrackerResult<ConquestRecord> {
    serde_json::from_slice(bytes).map_err(|e| TrackerError::Storage(format!("corrupt record: {e}")))
}
