//! Keystore repository
//!
//! Persists keystore metadata as JSON records in the `keystore` store.
//! Appending a key id is the only mutation after creation; it runs under a
//! per-keystore lock so concurrent key creations never lose an id.

use crate::errors::{KmsError, Result};
use crate::storage::{self, Store, StorageProvider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Name of the store holding keystore records
pub const KEYSTORE_STORE: &str = "keystore";

/// Keystore metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keystore {
    pub id: String,
    pub controller: String,
    #[serde(rename = "keyIDs", default)]
    pub key_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Keystore {
    /// A new keystore with no keys
    pub fn new(id: impl Into<String>, controller: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            controller: controller.into(),
            key_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Keystore persistence
pub trait Repository: Send + Sync {
    /// Store a new keystore; fails if the id is taken
    fn create(&self, keystore: &Keystore) -> Result<()>;

    /// Fetch a keystore by id
    fn get(&self, keystore_id: &str) -> Result<Keystore>;

    /// Overwrite a stored keystore
    fn update(&self, keystore: &Keystore) -> Result<()>;

    /// Append a key id to a keystore, atomically with respect to other appends
    fn append_key_id(&self, keystore_id: &str, key_id: &str) -> Result<Keystore>;
}

/// Process-wide table of per-keystore locks
///
/// Every repository handle over the same storage must share one table.
#[derive(Default)]
pub struct KeystoreLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeystoreLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding one keystore record
    fn lock_for(&self, keystore_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(keystore_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the table entry once no other caller holds or waits on it
    fn release(&self, keystore_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // one reference in the table, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(keystore_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Repository over a `Store`
pub struct StoreRepository {
    store: Arc<dyn Store>,
    locks: Arc<KeystoreLocks>,
}

impl StoreRepository {
    /// Create (if needed) and open the keystore store
    pub fn new(provider: &dyn StorageProvider, locks: Arc<KeystoreLocks>) -> Result<Self> {
        let store = storage::create_or_open(provider, KEYSTORE_STORE)?;
        Ok(Self { store, locks })
    }
}

impl Repository for StoreRepository {
    fn create(&self, keystore: &Keystore) -> Result<()> {
        let bytes = serde_json::to_vec(keystore)?;
        self.store.insert(&keystore.id, &bytes)?;

        debug!("Stored keystore: {}", keystore.id);
        Ok(())
    }

    fn get(&self, keystore_id: &str) -> Result<Keystore> {
        let bytes = self.store.get(keystore_id).map_err(|e| match e {
            KmsError::RecordNotFound(_) => KmsError::KeystoreNotFound(keystore_id.to_string()),
            other => other,
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            KmsError::DecodeError(format!("keystore {}: {}", keystore_id, e))
        })
    }

    fn update(&self, keystore: &Keystore) -> Result<()> {
        let bytes = serde_json::to_vec(keystore)?;
        self.store.put(&keystore.id, &bytes)
    }

    fn append_key_id(&self, keystore_id: &str, key_id: &str) -> Result<Keystore> {
        let lock = self.locks.lock_for(keystore_id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.append_locked(keystore_id, key_id)
        };
        self.locks.release(keystore_id, lock);
        result
    }
}

impl StoreRepository {
    /// Read-modify-write of the key id list; caller holds the keystore lock
    fn append_locked(&self, keystore_id: &str, key_id: &str) -> Result<Keystore> {
        let mut keystore = self.get(keystore_id)?;
        if keystore.key_ids.iter().any(|id| id == key_id) {
            return Ok(keystore);
        }

        keystore.key_ids.push(key_id.to_string());
        self.update(&keystore)?;

        debug!(
            "Added key {} to keystore {} ({} keys)",
            key_id,
            keystore_id,
            keystore.key_ids.len()
        );
        Ok(keystore)
    }
}
