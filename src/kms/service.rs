//! KMS operations over a provider bundle
//!
//! One `KmsService` serves one request: it owns the bundle and drops it (and
//! with it the unlocked key manager) when the request is done.

use crate::crypto::KeyType;
use crate::errors::{KmsError, Result};
use crate::provider::ProviderBundle;
use tracing::{info, warn};

/// Result of a verify call
#[derive(Debug)]
pub enum VerifyOutcome {
    /// The signature is valid
    Verified,
    /// Verification ran and rejected the signature
    Rejected(KmsError),
    /// Verification could not run
    Failed(KmsError),
}

/// Runs KMS operations against a request-scoped bundle
pub struct KmsService {
    provider: ProviderBundle,
}

impl KmsService {
    pub fn new(provider: ProviderBundle) -> Self {
        Self { provider }
    }

    /// Create a key and register it with its keystore
    pub fn create_key(&self, keystore_id: &str, key_type: &str) -> Result<String> {
        let key_type: KeyType = key_type.parse()?;
        let key_id = self.provider.kms().create_key(key_type)?;

        if let Err(e) = self.provider.keystore().append_key_id(keystore_id, &key_id) {
            warn!(
                "Key {} was created but could not be added to keystore {}: {}",
                key_id, keystore_id, e
            );
            return Err(e);
        }

        info!("Created {} key {} in keystore {}", key_type, key_id, keystore_id);
        Ok(key_id)
    }

    /// Sign a message
    pub fn sign(&self, key_id: &str, message: &[u8]) -> Result<Vec<u8>> {
        let key = self.provider.kms().get(key_id)?;
        self.provider.crypto().sign(message, &key)
    }

    /// Verify a signature, separating a rejection from an operational failure
    pub fn verify(&self, key_id: &str, signature: &[u8], message: &[u8]) -> VerifyOutcome {
        let key = match self.provider.kms().get(key_id) {
            Ok(key) => key,
            Err(e) => return VerifyOutcome::Failed(e),
        };

        match self.provider.crypto().verify(signature, message, &key) {
            Ok(()) => VerifyOutcome::Verified,
            Err(e) if e.is_invalid_signature() => VerifyOutcome::Rejected(e),
            Err(e) => VerifyOutcome::Failed(e),
        }
    }

    /// Encrypt a message, returning `(cipher_text, nonce)`
    pub fn encrypt(&self, key_id: &str, message: &[u8], aad: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = self.provider.kms().get(key_id)?;
        self.provider.crypto().encrypt(message, aad, &key)
    }

    /// Decrypt a message
    pub fn decrypt(
        &self,
        key_id: &str,
        cipher_text: &[u8],
        aad: &[u8],
        nonce: &[u8],
    ) -> Result<Vec<u8>> {
        let key = self.provider.kms().get(key_id)?;
        self.provider.crypto().decrypt(cipher_text, aad, nonce, &key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Crypto, KeyHandle, LocalCrypto};
    use crate::keystore::{Keystore, KeystoreLocks, Repository, StoreRepository};
    use crate::kms::mock::MockKeyManager;
    use crate::kms::sealed::test_kdf;
    use crate::kms::{KeyManager, KeyManagerContext, LocalKeyManagerCreator};
    use crate::provider::ProviderFactory;
    use crate::storage::{MemoryStorageProvider, StorageProvider};
    use std::sync::Arc;
    use std::thread;

    struct Fixture {
        storage: Arc<MemoryStorageProvider>,
        locks: Arc<KeystoreLocks>,
        factory: ProviderFactory,
    }

    impl Fixture {
        fn new() -> Self {
            let storage = Arc::new(MemoryStorageProvider::new());
            let locks = Arc::new(KeystoreLocks::new());
            let factory = ProviderFactory::new(
                storage.clone(),
                Arc::new(LocalKeyManagerCreator::new(storage.clone(), test_kdf())),
                Arc::new(LocalCrypto::new()),
                locks.clone(),
            );
            Self {
                storage,
                locks,
                factory,
            }
        }

        fn repo(&self) -> StoreRepository {
            StoreRepository::new(self.storage.as_ref() as &dyn StorageProvider, self.locks.clone())
                .unwrap()
        }

        fn keystore(&self, id: &str) -> String {
            self.repo().create(&Keystore::new(id, "did:example:123")).unwrap();
            id.to_string()
        }

        fn service(&self, keystore_id: &str) -> KmsService {
            KmsService::new(self.factory.build(keystore_id, "p4ss".into()).unwrap())
        }
    }

    /// Crypto whose verify always fails operationally
    struct BrokenVerifier;

    impl Crypto for BrokenVerifier {
        fn sign(&self, _: &[u8], _: &KeyHandle) -> Result<Vec<u8>> {
            Ok(vec![])
        }
        fn verify(&self, _: &[u8], _: &[u8], _: &KeyHandle) -> Result<()> {
            Err(KmsError::VerificationFailed("verify error".to_string()))
        }
        fn encrypt(&self, _: &[u8], _: &[u8], _: &KeyHandle) -> Result<(Vec<u8>, Vec<u8>)> {
            Ok((vec![], vec![]))
        }
        fn decrypt(&self, _: &[u8], _: &[u8], _: &[u8], _: &KeyHandle) -> Result<Vec<u8>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_create_key_registers_id() {
        let fx = Fixture::new();
        let ks = fx.keystore("ks1");

        let key_id = fx.service(&ks).create_key(&ks, "ED25519").unwrap();
        assert_eq!(fx.repo().get(&ks).unwrap().key_ids, vec![key_id]);
    }

    #[test]
    fn test_create_key_unknown_type() {
        let fx = Fixture::new();
        let ks = fx.keystore("ks1");

        let result = fx.service(&ks).create_key(&ks, "RSA4096");
        assert!(matches!(result, Err(KmsError::UnsupportedKeyType(_))));
        assert!(fx.repo().get(&ks).unwrap().key_ids.is_empty());
    }

    #[test]
    fn test_sign_then_verify() {
        let fx = Fixture::new();
        let ks = fx.keystore("ks1");
        let service = fx.service(&ks);
        let key_id = service.create_key(&ks, "ED25519").unwrap();

        let signature = service.sign(&key_id, b"test message").unwrap();
        assert!(matches!(
            service.verify(&key_id, &signature, b"test message"),
            VerifyOutcome::Verified
        ));
        assert!(matches!(
            service.verify(&key_id, &signature, b"other message"),
            VerifyOutcome::Rejected(_)
        ));
        assert!(matches!(
            service.verify("Fm4r2iwjYnswLRZKl38W", &signature, b"test message"),
            VerifyOutcome::Failed(KmsError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_operational_verify_error_is_failure() {
        let storage = Arc::new(MemoryStorageProvider::new());
        let creator = |_: &KeyManagerContext| -> Result<Box<dyn KeyManager>> {
            Ok(Box::new(MockKeyManager {
                get_key: Some(KeyHandle::generate(KeyType::Ed25519)),
                ..Default::default()
            }))
        };
        let factory = ProviderFactory::new(
            storage,
            Arc::new(creator),
            Arc::new(BrokenVerifier),
            Arc::new(KeystoreLocks::new()),
        );
        let service = KmsService::new(factory.build("ks1", "".into()).unwrap());

        assert!(matches!(
            service.verify("k1", b"sig", b"msg"),
            VerifyOutcome::Failed(KmsError::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let fx = Fixture::new();
        let ks = fx.keystore("ks1");
        let service = fx.service(&ks);
        let key_id = service.create_key(&ks, "AES256GCM").unwrap();

        let (cipher_text, nonce) = service
            .encrypt(&key_id, b"test message", b"additional data")
            .unwrap();

        // a new request unlocks the same key
        let plain_text = fx
            .service(&ks)
            .decrypt(&key_id, &cipher_text, b"additional data", &nonce)
            .unwrap();
        assert_eq!(plain_text, b"test message");

        assert!(matches!(
            service.decrypt(&key_id, &cipher_text, b"wrong aad", &nonce),
            Err(KmsError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_concurrent_key_creation_keeps_every_id() {
        const REQUESTS: usize = 16;

        let fx = Arc::new(Fixture::new());
        let ks = fx.keystore("ks1");
        fx.repo().append_key_id(&ks, "k1").unwrap();

        let handles: Vec<_> = (0..REQUESTS)
            .map(|_| {
                let fx = fx.clone();
                let ks = ks.clone();
                thread::spawn(move || fx.service(&ks).create_key(&ks, "ED25519").unwrap())
            })
            .collect();

        let created: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let keystore = fx.repo().get(&ks).unwrap();
        assert_eq!(keystore.key_ids.len(), REQUESTS + 1);
        for key_id in created {
            assert!(keystore.key_ids.contains(&key_id));
        }
    }
}
