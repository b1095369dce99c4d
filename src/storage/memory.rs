//! In-memory storage provider
//!
//! Stores live for the lifetime of the process. Handles opened on the same
//! store name share one map, so every request sees every other request's writes.

use crate::errors::{KmsError, Result};
use crate::storage::{validate_store_name, Store, StorageProvider};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// One named store
#[derive(Default)]
pub struct MemoryStore {
    /// Map of record key -> value
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .get(key)
            .cloned()
            .ok_or_else(|| KmsError::RecordNotFound(key.to_string()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn insert(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(key) {
            return Err(KmsError::RecordAlreadyExists(key.to_string()));
        }
        records.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// In-memory storage provider
pub struct MemoryStorageProvider {
    /// Map of store name -> store
    stores: RwLock<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryStorageProvider {
    /// Create a provider with no stores
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageProvider for MemoryStorageProvider {
    fn create_store(&self, name: &str) -> Result<()> {
        validate_store_name(name)?;

        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        if stores.contains_key(name) {
            return Err(KmsError::StoreAlreadyExists(name.to_string()));
        }
        stores.insert(name.to_string(), Arc::new(MemoryStore::default()));

        debug!("Created memory store: {}", name);
        Ok(())
    }

    fn open_store(&self, name: &str) -> Result<Arc<dyn Store>> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        let store = stores
            .get(name)
            .cloned()
            .ok_or_else(|| KmsError::StoreNotFound(name.to_string()))?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let provider = MemoryStorageProvider::new();
        provider.create_store("keystore").unwrap();
        let store = provider.open_store("keystore").unwrap();

        store.put("k1", b"v1").unwrap();
        assert_eq!(store.get("k1").unwrap(), b"v1");

        store.put("k1", b"v2").unwrap();
        assert_eq!(store.get("k1").unwrap(), b"v2");
    }

    #[test]
    fn test_missing_record() {
        let provider = MemoryStorageProvider::new();
        provider.create_store("keystore").unwrap();
        let store = provider.open_store("keystore").unwrap();

        assert!(matches!(store.get("nope"), Err(KmsError::RecordNotFound(_))));
    }

    #[test]
    fn test_insert_refuses_overwrite() {
        let provider = MemoryStorageProvider::new();
        provider.create_store("keystore").unwrap();
        let store = provider.open_store("keystore").unwrap();

        store.insert("k1", b"first").unwrap();
        let result = store.insert("k1", b"second");
        assert!(matches!(result, Err(KmsError::RecordAlreadyExists(_))));
        assert_eq!(store.get("k1").unwrap(), b"first");
    }

    #[test]
    fn test_store_lifecycle() {
        let provider = MemoryStorageProvider::new();
        assert!(matches!(
            provider.open_store("keystore"),
            Err(KmsError::StoreNotFound(_))
        ));

        provider.create_store("keystore").unwrap();
        assert!(matches!(
            provider.create_store("keystore"),
            Err(KmsError::StoreAlreadyExists(_))
        ));
        assert!(provider.open_store("keystore").is_ok());
    }

    #[test]
    fn test_handles_share_state() {
        let provider = MemoryStorageProvider::new();
        provider.create_store("keystore").unwrap();

        let a = provider.open_store("keystore").unwrap();
        let b = provider.open_store("keystore").unwrap();
        a.put("shared", b"yes").unwrap();
        assert_eq!(b.get("shared").unwrap(), b"yes");
    }
}
