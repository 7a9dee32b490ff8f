use crate::{KVStore, Result};
use bytes::Bytes;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const OBJECTS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("objects");

/// redb-based storage backend
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open (or create) the database file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening redb database at: {}", path.as_ref().display());

        let db = Database::create(path.as_ref())?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(OBJECTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KVStore for RedbBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        debug!("Getting key: {:?}", String::from_utf8_lossy(key));

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OBJECTS_TABLE)?;
        let value = table.get(key)?.map(|v| Bytes::from(v.value().to_vec()));
        Ok(value)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        debug!("Putting key: {:?}", String::from_utf8_lossy(key));

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OBJECTS_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn compare_and_swap(&self, key: &[u8], expected: Option<&[u8]>, value: &[u8]) -> Result<bool> {
        debug!("Compare-and-swap key: {:?}", String::from_utf8_lossy(key));

        // redb allows a single write transaction at a time, so the read and
        // the insert below cannot interleave with another writer.
        let write_txn = self.db.begin_write()?;
        let swapped = {
            let mut table = write_txn.open_table(OBJECTS_TABLE)?;
            let matches = {
                let current = table.get(key)?;
                match (current.as_ref().map(|v| v.value()), expected) {
                    (None, None) => true,
                    (Some(current), Some(expected)) => current == expected,
                    _ => false,
                }
            };
            if matches {
                table.insert(key, value)?;
            }
            matches
        };

        if swapped {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(swapped)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        debug!("Deleting key: {:?}", String::from_utf8_lossy(key));

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OBJECTS_TABLE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OBJECTS_TABLE)?;

        let mut results = Vec::new();
        for entry in table.range::<&[u8]>(prefix..)? {
            let (key, value) = entry?;
            if !key.value().starts_with(prefix) {
                break;
            }
            results.push((
                Bytes::from(key.value().to_vec()),
                Bytes::from(value.value().to_vec()),
            ));
        }

        debug!("Scan found {} results", results.len());
        Ok(results)
    }
}
