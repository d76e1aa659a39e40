//! Account tables - per-identity conquests and favorites
//!
//! Rows are keyed by `identity \x1f pass_id`, which makes every write an
//! upsert on `(identity, pass_id)` and lets a prefix scan list one account.

use redb::TableDefinition;

use crate::error::TrackerResult;
use crate::types::{ConquestRecord, FavoriteRecord, Identity, PassId};

use super::{account_key, scan_account, Storage};

/// Table for account conquests (key: identity+pass, value: JSON ConquestRecord)
pub(crate) const ACCOUNT_CONQUESTS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("account_conquests");

/// Table for account favorites (key: identity+pass, value: JSON FavoriteRecord)
pub(crate) const ACCOUNT_FAVORITES_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("account_favorites");

impl Storage {
    // ═══════════════════════════════════════════════════════════════════════
    // Conquest Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// All conquests of `identity`, ordered by pass id
    pub fn list_account_conquests(&self, identity: &Identity) -> TrackerResult<Vec<ConquestRecord>> {
        scan_account(self.db(), ACCOUNT_CONQUESTS_TABLE, identity)
    }

    /// Insert or overwrite the conquest for `(identity, record.pass_id)`
    pub fn put_account_conquest(
        &self,
        identity: &Identity,
        record: &ConquestRecord,
    ) -> TrackerResult<()> {
        let write_txn = self.db().begin_write()?;
        {
            let mut table = write_txn.open_table(ACCOUNT_CONQUESTS_TABLE)?;
            let key = account_key(identity, &record.pass_id);
            let data = serde_json::to_vec(record)?;
            table.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove the conquest for `(identity, pass_id)`.
    ///
    /// Returns whether a row existed.
    pub fn remove_account_conquest(
        &self,
        identity: &Identity,
        pass_id: &PassId,
    ) -> TrackerResult<bool> {
        let write_txn = self.db().begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(ACCOUNT_CONQUESTS_TABLE)?;
            let key = account_key(identity, pass_id);
            let removed = table.remove(key.as_str())?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Favorite Operations
    // ═══════════════════════════════════════════════════════════════════════

    pub fn list_account_favorites(&self, identity: &Identity) -> TrackerResult<Vec<PassId>> {
        let favorites: Vec<FavoriteRecord> =
            scan_account(self.db(), ACCOUNT_FAVORITES_TABLE, identity)?;
        Ok(favorites.into_iter().map(|f| f.pass_id).collect())
    }

    pub fn put_account_favorite(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        let write_txn = self.db().begin_write()?;
        {
            let mut table = write_txn.open_table(ACCOUNT_FAVORITES_TABLE)?;
            let key = account_key(identity, pass_id);
            let data = serde_json::to_vec(&FavoriteRecord {
                pass_id: pass_id.clone(),
            })?;
            table.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn remove_account_favorite(
        &self,
        identity: &Identity,
        pass_id: &PassId,
    ) -> TrackerResult<bool> {
        let write_txn = self.db().begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(ACCOUNT_FAVORITES_TABLE)?;
            let key = account_key(identity, pass_id);
            let removed = table.remove(key.as_str())?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFallbackStore;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("test.redb")).unwrap();
        (storage, temp_dir)
    }

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn pass(s: &str) -> PassId {
        PassId::new(s).unwrap()
    }

    #[test]
    fn test_conquests_are_scoped_per_identity() {
        let (storage, _temp) = create_test_storage();
        let record = ConquestRecord::completed_today(pass("furka"));

        storage.put_account_conquest(&id("alice"), &record).unwrap();
        storage.put_account_conquest(&id("ali"), &record).unwrap();

        assert_eq!(storage.list_account_conquests(&id("alice")).unwrap().len(), 1);
        assert_eq!(storage.list_account_conquests(&id("ali")).unwrap().len(), 1);
        assert!(storage.list_account_conquests(&id("bob")).unwrap().is_empty());
    }

    #[test]
    fn test_put_conquest_is_an_upsert() {
        let (storage, _temp) = create_test_storage();
        let alice = id("alice");

        storage
            .put_account_conquest(&alice, &ConquestRecord::completed_today(pass("grimsel")))
            .unwrap();
        let updated =
            ConquestRecord::completed_today(pass("grimsel")).with_photos(vec!["lake.jpg".into()]);
        storage.put_account_conquest(&alice, &updated).unwrap();

        assert_eq!(storage.list_account_conquests(&alice).unwrap(), vec![updated]);
    }

    #[test]
    fn test_remove_conquest_reports_existence() {
        let (storage, _temp) = create_test_storage();
        let alice = id("alice");
        storage
            .put_account_conquest(&alice, &ConquestRecord::completed_today(pass("susten")))
            .unwrap();

        assert!(storage.remove_account_conquest(&alice, &pass("susten")).unwrap());
        assert!(!storage.remove_account_conquest(&alice, &pass("susten")).unwrap());
    }

    #[test]
    fn test_favorites_roundtrip_without_duplicates() {
        let (storage, _temp) = create_test_storage();
        let alice = id("alice");

        storage.put_account_favorite(&alice, &pass("mont-ventoux")).unwrap();
        storage.put_account_favorite(&alice, &pass("mont-ventoux")).unwrap();
        storage.put_account_favorite(&alice, &pass("alpe-dhuez")).unwrap();

        let favorites = storage.list_account_favorites(&alice).unwrap();
        assert_eq!(favorites, vec![pass("alpe-dhuez"), pass("mont-ventoux")]);

        assert!(storage.remove_account_favorite(&alice, &pass("alpe-dhuez")).unwrap());
        assert_eq!(storage.list_account_favorites(&alice).unwrap().len(), 1);
    }

    #[test]
    fn test_account_tables_do_not_touch_local_store() {
        let (storage, _temp) = create_test_storage();
        storage
            .put_account_conquest(&id("alice"), &ConquestRecord::completed_today(pass("bernina")))
            .unwrap();
        assert!(storage.load().unwrap().is_empty());
    }
}
