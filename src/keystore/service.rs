//! Keystore service
//!
//! Mints keystore identifiers and stores new keystores. Kept apart from the
//! repository so callers can substitute it without touching storage.

use crate::errors::Result;
use crate::keystore::repository::{Keystore, KeystoreLocks, Repository, StoreRepository};
use crate::storage::StorageProvider;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Creates keystores
pub trait KeystoreService: Send + Sync {
    /// Create a keystore owned by `controller` and return its new id
    fn create(&self, controller: &str) -> Result<String>;
}

/// Keystore service over the configured storage provider
pub struct DefaultKeystoreService {
    storage: Arc<dyn StorageProvider>,
    locks: Arc<KeystoreLocks>,
}

impl DefaultKeystoreService {
    pub fn new(storage: Arc<dyn StorageProvider>, locks: Arc<KeystoreLocks>) -> Self {
        Self { storage, locks }
    }
}

impl KeystoreService for DefaultKeystoreService {
    fn create(&self, controller: &str) -> Result<String> {
        let repo = StoreRepository::new(self.storage.as_ref(), self.locks.clone())?;

        let keystore = Keystore::new(Uuid::new_v4().to_string(), controller);
        repo.create(&keystore)?;

        info!("Created keystore {}", keystore.id);
        Ok(keystore.id)
    }
}
