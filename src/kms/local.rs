//! Local key manager
//!
//! Each keystore gets its own store (`kms_<keystore id>`) holding:
//! - a passphrase check record, written on first use
//! - one sealed record per key, bound to its key id

use crate::config::KdfConfig;
use crate::crypto::{KeyHandle, KeyType};
use crate::errors::{KmsError, Result};
use crate::keystore::KEYSTORE_STORE;
use crate::kms::sealed::{generate_salt, Sealed, WrappingKey};
use crate::kms::{KeyManager, KeyManagerContext, KeyManagerCreator};
use crate::storage::{self, Store, StorageProvider};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Record name of the passphrase check; '.' never appears in a key id
const CHECK_RECORD: &str = ".passphrase_check";

/// Plaintext sealed in the passphrase check record
const CHECK_PLAINTEXT: &[u8] = b"keyhub passphrase check v1";

/// Random bytes in a key id (encodes to 20 URL-safe characters)
const KEY_ID_BYTES: usize = 15;

/// Length of an encoded key id
const KEY_ID_LEN: usize = 20;

/// Current record format
const RECORD_VERSION: u32 = 1;

/// Proof that a passphrase was used with this keystore before
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PassphraseCheck {
    version: u32,
    /// Argon2 salt (base64)
    salt: String,
    sealed: Sealed,
}

/// A key at rest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SealedKeyRecord {
    version: u32,
    key_type: String,
    sealed: Sealed,
    created_at: i64,
}

/// Name of the store holding one keystore's keys
pub fn key_namespace(keystore_id: &str) -> String {
    format!("kms_{}", keystore_id)
}

fn new_key_id() -> String {
    let mut bytes = [0u8; KEY_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn is_key_id(candidate: &str) -> bool {
    candidate.len() == KEY_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Key manager bound to one keystore and its unlocked wrapping key
pub struct LocalKeyManager {
    keystore_id: String,
    store: Arc<dyn Store>,
    wrapping_key: WrappingKey,
}

impl KeyManager for LocalKeyManager {
    fn create_key(&self, key_type: KeyType) -> Result<String> {
        let handle = KeyHandle::generate(key_type);
        let key_id = new_key_id();

        let record = SealedKeyRecord {
            version: RECORD_VERSION,
            key_type: key_type.as_str().to_string(),
            sealed: self
                .wrapping_key
                .seal(handle.secret_bytes().expose(), key_id.as_bytes())?,
            created_at: chrono::Utc::now().timestamp(),
        };

        self.store.insert(&key_id, &serde_json::to_vec(&record)?)?;

        debug!(
            "Created {} key {} in keystore {}",
            key_type, key_id, self.keystore_id
        );
        Ok(key_id)
    }

    fn get(&self, key_id: &str) -> Result<KeyHandle> {
        if !is_key_id(key_id) {
            return Err(KmsError::KeyNotFound(key_id.to_string()));
        }

        let bytes = self.store.get(key_id).map_err(|e| match e {
            KmsError::RecordNotFound(_) => KmsError::KeyNotFound(key_id.to_string()),
            other => other,
        })?;

        let record: SealedKeyRecord = serde_json::from_slice(&bytes)?;
        let key_type: KeyType = record.key_type.parse()?;
        let raw = self.wrapping_key.open(&record.sealed, key_id.as_bytes())?;

        KeyHandle::from_bytes(key_type, raw.expose())
    }
}

/// Builds `LocalKeyManager`s from the shared storage provider
pub struct LocalKeyManagerCreator {
    storage: Arc<dyn StorageProvider>,
    kdf: KdfConfig,
}

impl LocalKeyManagerCreator {
    pub fn new(storage: Arc<dyn StorageProvider>, kdf: KdfConfig) -> Self {
        Self { storage, kdf }
    }

    fn ensure_keystore_exists(&self, keystore_id: &str) -> Result<()> {
        let keystores = self.storage.open_store(KEYSTORE_STORE)?;
        match keystores.get(keystore_id) {
            Ok(_) => Ok(()),
            Err(KmsError::RecordNotFound(_)) => {
                Err(KmsError::KeystoreNotFound(keystore_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Derive the wrapping key, writing the check record on first use
    fn unlock(&self, store: &dyn Store, ctx: &KeyManagerContext) -> Result<WrappingKey> {
        match store.get(CHECK_RECORD) {
            Ok(bytes) => self.verify_passphrase(&bytes, ctx),
            Err(KmsError::RecordNotFound(_)) => {
                let salt = generate_salt();
                let key = WrappingKey::derive(ctx.passphrase.expose(), &salt, &self.kdf)?;
                let check = PassphraseCheck {
                    version: RECORD_VERSION,
                    salt: STANDARD.encode(salt),
                    sealed: key.seal(CHECK_PLAINTEXT, ctx.keystore_id.as_bytes())?,
                };

                match store.insert(CHECK_RECORD, &serde_json::to_vec(&check)?) {
                    Ok(()) => {
                        info!("Initialized key storage for keystore {}", ctx.keystore_id);
                        Ok(key)
                    }
                    // Another request initialized it first; its passphrase wins
                    Err(KmsError::RecordAlreadyExists(_)) => {
                        let bytes = store.get(CHECK_RECORD)?;
                        self.verify_passphrase(&bytes, ctx)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn verify_passphrase(&self, bytes: &[u8], ctx: &KeyManagerContext) -> Result<WrappingKey> {
        let check: PassphraseCheck = serde_json::from_slice(bytes)?;
        let salt = STANDARD.decode(&check.salt)?;

        let key = WrappingKey::derive(ctx.passphrase.expose(), &salt, &self.kdf)?;
        match key.open(&check.sealed, ctx.keystore_id.as_bytes()) {
            Ok(plaintext) if plaintext.expose() == CHECK_PLAINTEXT => Ok(key),
            _ => Err(KmsError::InvalidPassphrase(ctx.keystore_id.clone())),
        }
    }
}

impl KeyManagerCreator for LocalKeyManagerCreator {
    fn create(&self, ctx: &KeyManagerContext) -> Result<Box<dyn KeyManager>> {
        self.ensure_keystore_exists(&ctx.keystore_id)?;

        let store = storage::create_or_open(self.storage.as_ref(), &key_namespace(&ctx.keystore_id))?;
        let wrapping_key = self.unlock(store.as_ref(), ctx)?;

        Ok(Box::new(LocalKeyManager {
            keystore_id: ctx.keystore_id.clone(),
            store,
            wrapping_key,
        }))
    }
}
