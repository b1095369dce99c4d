//! Passphrase sealing
//!
//! Key material is sealed at rest with AES-256-GCM under a wrapping key that
//! is derived from the keystore passphrase with Argon2id.

use crate::config::KdfConfig;
use crate::errors::{KmsError, Result};
use crate::security::SecureBytes;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Salt size for Argon2
pub const SALT_SIZE: usize = 16;

/// Nonce size for AES-GCM
const NONCE_SIZE: usize = 12;

/// Wrapping key length (AES-256)
const WRAPPING_KEY_SIZE: usize = 32;

/// A sealed blob as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sealed {
    /// Nonce for AES-GCM (base64)
    pub nonce: String,

    /// Encrypted payload (base64)
    pub cipher_text: String,
}

/// Key derived from a passphrase; only lives as long as one key manager
pub struct WrappingKey {
    key: SecureBytes,
}

impl WrappingKey {
    /// Derive the wrapping key using Argon2id
    pub fn derive(passphrase: &str, salt: &[u8], kdf: &KdfConfig) -> Result<Self> {
        let params = Params::new(
            kdf.memory_kib,
            kdf.iterations,
            kdf.parallelism,
            Some(WRAPPING_KEY_SIZE),
        )
        .map_err(|e| KmsError::InternalError(format!("kdf parameters: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = SecureBytes::zeros(WRAPPING_KEY_SIZE);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, key.expose_mut())
            .map_err(|e| KmsError::InternalError(format!("key derivation: {}", e)))?;

        Ok(Self { key })
    }

    /// Encrypt `plaintext`, binding it to `aad`
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher_text = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| KmsError::EncryptionFailed(e.to_string()))?;

        Ok(Sealed {
            nonce: STANDARD.encode(nonce_bytes),
            cipher_text: STANDARD.encode(cipher_text),
        })
    }

    /// Decrypt a sealed blob; fails on a wrong key or a mismatched `aad`
    pub fn open(&self, sealed: &Sealed, aad: &[u8]) -> Result<SecureBytes> {
        let nonce_bytes = STANDARD.decode(&sealed.nonce)?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(KmsError::DecodeError(format!(
                "sealed nonce has {} bytes",
                nonce_bytes.len()
            )));
        }

        let cipher_text = STANDARD.decode(&sealed.cipher_text)?;

        let plaintext = self
            .cipher()?
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &cipher_text,
                    aad,
                },
            )
            .map_err(|_| {
                KmsError::DecryptionFailed("unable to unseal - wrong passphrase?".to_string())
            })?;

        Ok(SecureBytes::new(plaintext))
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.expose())
            .map_err(|e| KmsError::InternalError(e.to_string()))
    }
}

/// Fresh random salt
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
pub(crate) fn test_kdf() -> KdfConfig {
    KdfConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}
