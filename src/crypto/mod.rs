//! Cryptographic operations on key handles
//!
//! The `Crypto` trait is the capability the dispatcher calls; it never sees
//! how a key was stored, only the unsealed handle for the current request.

pub mod keys;
pub mod local;

pub use keys::{KeyHandle, KeyType};
pub use local::LocalCrypto;

use crate::errors::Result;

/// Sign/verify/encrypt/decrypt with a key handle
///
/// Implementations are stateless and shared across requests.
pub trait Crypto: Send + Sync {
    /// Sign `message`, returning the raw signature bytes
    fn sign(&self, message: &[u8], key: &KeyHandle) -> Result<Vec<u8>>;

    /// Check `signature` over `message`
    ///
    /// A signature that does not verify yields `KmsError::InvalidSignature`;
    /// any other error means verification could not run.
    fn verify(&self, signature: &[u8], message: &[u8], key: &KeyHandle) -> Result<()>;

    /// Encrypt `message` bound to `aad`, returning `(cipher_text, nonce)`
    fn encrypt(&self, message: &[u8], aad: &[u8], key: &KeyHandle) -> Result<(Vec<u8>, Vec<u8>)>;

    /// Decrypt and authenticate `cipher_text`
    fn decrypt(
        &self,
        cipher_text: &[u8],
        aad: &[u8],
        nonce: &[u8],
        key: &KeyHandle,
    ) -> Result<Vec<u8>>;
}
