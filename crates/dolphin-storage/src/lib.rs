//! Dolphin Storage - Backing store for reconciled objects
//!
//! This crate provides:
//! - KVStore trait with compare-and-swap writes
//! - redb-based implementation
//! - In-memory implementation for tests and dry runs
//! - Key encoding

pub mod encoding;
pub mod error;
pub mod kv;
pub mod memory;
pub mod redb_backend;

// Re-export commonly used types
pub use encoding::KeyEncoder;
pub use error::{Result, StorageError};
pub use kv::KVStore;
pub use memory::MemoryBackend;
pub use redb_backend::RedbBackend;
