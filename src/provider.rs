//! Request-scoped provider composition
//!
//! A `ProviderBundle` ties the keystore repository, the key manager unlocked
//! for one keystore, and the shared crypto engine together for the length of
//! a single request. Nothing here is cached between requests.

use crate::crypto::Crypto;
use crate::errors::Result;
use crate::keystore::{KeystoreLocks, Repository, StoreRepository};
use crate::kms::{KeyManager, KeyManagerContext, KeyManagerCreator};
use crate::security::SecureString;
use crate::storage::StorageProvider;
use std::sync::Arc;
use tracing::debug;

/// Everything one operation needs
pub struct ProviderBundle {
    keystore: Box<dyn Repository>,
    kms: Box<dyn KeyManager>,
    crypto: Arc<dyn Crypto>,
}

impl ProviderBundle {
    pub fn keystore(&self) -> &dyn Repository {
        self.keystore.as_ref()
    }

    pub fn kms(&self) -> &dyn KeyManager {
        self.kms.as_ref()
    }

    pub fn crypto(&self) -> &dyn Crypto {
        self.crypto.as_ref()
    }
}

/// Builds a fresh `ProviderBundle` per request from injected capabilities
pub struct ProviderFactory {
    storage: Arc<dyn StorageProvider>,
    kms_creator: Arc<dyn KeyManagerCreator>,
    crypto: Arc<dyn Crypto>,
    locks: Arc<KeystoreLocks>,
}

impl ProviderFactory {
    pub fn new(
        storage: Arc<dyn StorageProvider>,
        kms_creator: Arc<dyn KeyManagerCreator>,
        crypto: Arc<dyn Crypto>,
        locks: Arc<KeystoreLocks>,
    ) -> Self {
        Self {
            storage,
            kms_creator,
            crypto,
            locks,
        }
    }

    /// Open the repository, unlock the keystore's key manager, attach crypto
    pub fn build(&self, keystore_id: &str, passphrase: SecureString) -> Result<ProviderBundle> {
        let keystore = StoreRepository::new(self.storage.as_ref(), self.locks.clone())?;

        let kms = self.kms_creator.create(&KeyManagerContext {
            keystore_id: keystore_id.to_string(),
            passphrase,
        })?;

        debug!("Built provider for keystore {}", keystore_id);

        Ok(ProviderBundle {
            keystore: Box::new(keystore),
            kms,
            crypto: self.crypto.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LocalCrypto;
    use crate::errors::KmsError;
    use crate::kms::mock::MockKeyManager;
    use crate::storage::mock::MockStorageProvider;
    use crate::storage::MemoryStorageProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mock_creator() -> Arc<dyn KeyManagerCreator> {
        Arc::new(|_: &KeyManagerContext| -> Result<Box<dyn KeyManager>> {
            Ok(Box::new(MockKeyManager {
                create_key_id: "Fm4r2iwjYnswLRZKl38W".to_string(),
                ..Default::default()
            }))
        })
    }

    #[test]
    fn test_build() {
        let factory = ProviderFactory::new(
            Arc::new(MemoryStorageProvider::new()),
            mock_creator(),
            Arc::new(LocalCrypto::new()),
            Arc::new(KeystoreLocks::new()),
        );

        let bundle = factory.build("ks1", "".into()).unwrap();
        assert!(matches!(
            bundle.keystore().get("ks1"),
            Err(KmsError::KeystoreNotFound(_))
        ));
    }

    #[test]
    fn test_creator_receives_context_and_runs_per_build() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let creator = move |ctx: &KeyManagerContext| -> Result<Box<dyn KeyManager>> {
            assert_eq!(ctx.keystore_id, "ks1");
            assert_eq!(ctx.passphrase.expose(), "p4ss");
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockKeyManager::default()))
        };

        let factory = ProviderFactory::new(
            Arc::new(MemoryStorageProvider::new()),
            Arc::new(creator),
            Arc::new(LocalCrypto::new()),
            Arc::new(KeystoreLocks::new()),
        );

        factory.build("ks1", "p4ss".into()).unwrap();
        factory.build("ks1", "p4ss".into()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_storage_failure() {
        let storage = Arc::new(MockStorageProvider::new());
        storage.fail_open_store("open store error");

        let factory = ProviderFactory::new(
            storage,
            mock_creator(),
            Arc::new(LocalCrypto::new()),
            Arc::new(KeystoreLocks::new()),
        );

        let err = factory.build("ks1", "".into()).err().unwrap();
        assert!(err.to_string().contains("open store error"));
    }

    #[test]
    fn test_creator_failure() {
        let creator = |_: &KeyManagerContext| -> Result<Box<dyn KeyManager>> {
            Err(KmsError::InternalError("kms creator error".to_string()))
        };
        let factory = ProviderFactory::new(
            Arc::new(MemoryStorageProvider::new()),
            Arc::new(creator),
            Arc::new(LocalCrypto::new()),
            Arc::new(KeystoreLocks::new()),
        );

        let err = factory.build("ks1", "".into()).err().unwrap();
        assert!(err.to_string().contains("kms creator error"));
    }
}
