//! Key management
//!
//! This module provides:
//! - The `KeyManager` capability (create and fetch keys of one keystore)
//! - The `KeyManagerCreator` capability that builds a key manager per request
//! - A passphrase-sealed local key manager
//! - `KmsService`, which runs one operation against a provider bundle

pub mod local;
pub mod sealed;
pub mod service;

pub use local::LocalKeyManagerCreator;
pub use service::{KmsService, VerifyOutcome};

use crate::crypto::{KeyHandle, KeyType};
use crate::errors::Result;
use crate::security::SecureString;

/// Creates and resolves keys inside a single keystore
pub trait KeyManager: Send + Sync {
    /// Generate a key and return its new identifier
    fn create_key(&self, key_type: KeyType) -> Result<String>;

    /// Unseal a key for use in the current request
    fn get(&self, key_id: &str) -> Result<KeyHandle>;
}

/// What a key manager is built from
#[derive(Debug, Clone)]
pub struct KeyManagerContext {
    pub keystore_id: String,
    pub passphrase: SecureString,
}

/// Builds the key manager of one keystore
///
/// Any error (bad passphrase, missing keystore, backend outage) is reported by
/// the caller as a provider failure without further distinction.
pub trait KeyManagerCreator: Send + Sync {
    fn create(&self, ctx: &KeyManagerContext) -> Result<Box<dyn KeyManager>>;
}

impl<F> KeyManagerCreator for F
where
    F: Fn(&KeyManagerContext) -> Result<Box<dyn KeyManager>> + Send + Sync,
{
    fn create(&self, ctx: &KeyManagerContext) -> Result<Box<dyn KeyManager>> {
        self(ctx)
    }
}
