use crate::{KVStore, Result};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

/// In-memory storage backend
///
/// Used by tests and by `--dry-run` reconciliation, where nothing should
/// outlive the process.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<Vec<u8>, Bytes>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KVStore for MemoryBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_vec(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn compare_and_swap(&self, key: &[u8], expected: Option<&[u8]>, value: &[u8]) -> Result<bool> {
        let mut entries = self.entries.write();
        let matches = match (entries.get(key), expected) {
            (None, None) => true,
            (Some(current), Some(expected)) => current.as_ref() == expected,
            _ => false,
        };

        if matches {
            entries.insert(key.to_vec(), Bytes::copy_from_slice(value));
        } else {
            debug!("Compare-and-swap rejected for {:?}", String::from_utf8_lossy(key));
        }
        Ok(matches)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (Bytes::copy_from_slice(k), v.clone()))
            .collect())
    }
}
