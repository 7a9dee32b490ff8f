use crate::Result;
use bytes::Bytes;

/// Key-value store trait
pub trait KVStore: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Put a key-value pair unconditionally
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Atomically replace the value at `key` if it still equals `expected`.
    ///
    /// `expected = None` means the key must be absent. Returns false, and
    /// leaves the store untouched, when the current value differs.
    fn compare_and_swap(&self, key: &[u8], expected: Option<&[u8]>, value: &[u8]) -> Result<bool>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Scan keys with a given prefix, in key order
    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>>;
}
