//! Local fallback store on redb
//!
//! Holds the anonymous user's conquests on this device, keyed by pass id.

use redb::{ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::TrackerResult;
use crate::types::{ConquestRecord, PassId};

use super::{decode_record, LocalFallbackStore, Storage};

/// Table for local conquests (key: pass id, value: JSON ConquestRecord)
pub(crate) const LOCAL_CONQUESTS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("local_conquests");

impl LocalFallbackStore for Storage {
    fn load(&self) -> TrackerResult<Vec<ConquestRecord>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(LOCAL_CONQUESTS_TABLE)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            records.push(decode_record(value.value())?);
        }
        Ok(records)
    }

    fn save(&self, records: &[ConquestRecord]) -> TrackerResult<()> {
        let write_txn = self.db().begin_write()?;
        {
            let mut table = write_txn.open_table(LOCAL_CONQUESTS_TABLE)?;

            let stale: Vec<String> = table
                .iter()?
                .map(|entry| entry.map(|(k, _)| k.value().to_string()))
                .collect::<Result<_, _>>()?;
            for key in &stale {
                table.remove(key.as_str())?;
            }

            for record in records {
                let data = serde_json::to_vec(record)?;
                table.insert(record.pass_id.as_str(), data.as_slice())?;
            }
        }
        write_txn.commit()?;
        debug!(count = records.len(), "Saved local conquests");
        Ok(())
    }

    fn upsert_one(&self, record: &ConquestRecord) -> TrackerResult<()> {
        let write_txn = self.db().begin_write()?;
        {
            let mut table = write_txn.open_table(LOCAL_CONQUESTS_TABLE)?;
            let data = serde_json::to_vec(record)?;
            table.insert(record.pass_id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_one(&self, pass_id: &PassId) -> TrackerResult<()> {
        let write_txn = self.db().begin_write()?;
        {
            let mut table = write_txn.open_table(LOCAL_CONQUESTS_TABLE)?;
            table.remove(pass_id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("test.redb")).unwrap();
        (storage, temp_dir)
    }

    fn record(pass: &str) -> ConquestRecord {
        ConquestRecord::completed_today(PassId::new(pass).unwrap())
    }

    #[test]
    fn test_upsert_overwrites_same_pass() {
        let (storage, _temp) = create_test_storage();

        storage.upsert_one(&record("tourmalet")).unwrap();
        let with_photo = record("tourmalet").with_photos(vec!["summit.jpg".into()]);
        storage.upsert_one(&with_photo).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded, vec![with_photo]);
    }

    #[test]
    fn test_delete_one_missing_is_ok() {
        let (storage, _temp) = create_test_storage();
        storage
            .delete_one(&PassId::new("nowhere").unwrap())
            .unwrap();
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_replaces_everything() {
        let (storage, _temp) = create_test_storage();
        storage.upsert_one(&record("izoard")).unwrap();
        storage.upsert_one(&record("galibier")).unwrap();

        storage.save(&[record("stelvio")]).unwrap();

        let passes: Vec<_> = storage
            .load()
            .unwrap()
            .into_iter()
            .map(|r| r.pass_id.to_string())
            .collect();
        assert_eq!(passes, vec!["stelvio"]);
    }

    #[test]
    fn test_local_records_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.redb");
        {
            let storage = Storage::new(&path).unwrap();
            storage.upsert_one(&record("col-du-glandon")).unwrap();
        }
        let storage = Storage::new(&path).unwrap();
        assert_eq!(storage.load().unwrap().len(), 1);
    }
}
