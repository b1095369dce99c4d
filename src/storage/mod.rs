//! Key-value storage capability
//!
//! Keystore metadata and sealed keys are persisted through these two traits:
//! - `StorageProvider` creates and opens named stores
//! - `Store` reads and writes opaque byte values inside one store
//!
//! Implementations:
//! - In-memory (tests, ephemeral deployments)
//! - File-backed (one directory per store, one file per record)

pub mod file;
pub mod memory;

pub use file::FileStorageProvider;
pub use memory::MemoryStorageProvider;

use crate::errors::{KmsError, Result};
use std::sync::Arc;

/// A named collection of records
pub trait Store: Send + Sync {
    /// Read a record; `RecordNotFound` when absent
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Write a record, replacing any previous value
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Write a record only if the key is unused; `RecordAlreadyExists` otherwise
    fn insert(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Hands out store handles
pub trait StorageProvider: Send + Sync {
    /// Create a new store; `StoreAlreadyExists` if the name is taken
    fn create_store(&self, name: &str) -> Result<()>;

    /// Open an existing store; `StoreNotFound` if it was never created
    fn open_store(&self, name: &str) -> Result<Arc<dyn Store>>;
}

/// Create the store if needed, then open it
pub fn create_or_open(provider: &dyn StorageProvider, name: &str) -> Result<Arc<dyn Store>> {
    match provider.create_store(name) {
        Ok(()) | Err(KmsError::StoreAlreadyExists(_)) => {}
        Err(e) => return Err(e),
    }
    provider.open_store(name)
}

/// Store names end up as directory names for the file backend
pub(crate) fn validate_store_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(KmsError::StorageError(format!("invalid store name: {:?}", name)))
    }
}
