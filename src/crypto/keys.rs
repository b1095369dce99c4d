//! Key types and in-memory key handles

use crate::errors::{KmsError, Result};
use crate::security::SecureBytes;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Length of every supported raw key (Ed25519 seed, AES-256, ChaCha20)
pub const KEY_SIZE: usize = 32;

/// Supported key types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Ed25519,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ED25519",
            KeyType::Aes256Gcm => "AES256GCM",
            KeyType::ChaCha20Poly1305 => "ChaCha20Poly1305",
        }
    }
}

impl FromStr for KeyType {
    type Err = KmsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(KeyType::Ed25519),
            "aes256gcm" => Ok(KeyType::Aes256Gcm),
            "chacha20poly1305" => Ok(KeyType::ChaCha20Poly1305),
            _ => Err(KmsError::UnsupportedKeyType(s.to_string())),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unsealed key material, alive for one request only
///
/// Every variant wipes its memory on drop.
pub enum KeyHandle {
    Ed25519(SigningKey),
    Aes256Gcm(SecureBytes),
    ChaCha20Poly1305(SecureBytes),
}

impl KeyHandle {
    /// Generate fresh key material
    pub fn generate(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Ed25519 => KeyHandle::Ed25519(SigningKey::generate(&mut OsRng)),
            KeyType::Aes256Gcm => KeyHandle::Aes256Gcm(random_key()),
            KeyType::ChaCha20Poly1305 => KeyHandle::ChaCha20Poly1305(random_key()),
        }
    }

    /// Rebuild a handle from raw bytes (32 bytes for every type)
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(KmsError::InvalidKeyFormat(format!(
                "expected {} bytes for {}, got {}",
                KEY_SIZE,
                key_type,
                bytes.len()
            )));
        }

        Ok(match key_type {
            KeyType::Ed25519 => {
                let mut seed = [0u8; KEY_SIZE];
                seed.copy_from_slice(bytes);
                let handle = KeyHandle::Ed25519(SigningKey::from_bytes(&seed));
                seed.zeroize();
                handle
            }
            KeyType::Aes256Gcm => KeyHandle::Aes256Gcm(SecureBytes::from(bytes)),
            KeyType::ChaCha20Poly1305 => KeyHandle::ChaCha20Poly1305(SecureBytes::from(bytes)),
        })
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyHandle::Ed25519(_) => KeyType::Ed25519,
            KeyHandle::Aes256Gcm(_) => KeyType::Aes256Gcm,
            KeyHandle::ChaCha20Poly1305(_) => KeyType::ChaCha20Poly1305,
        }
    }

    /// Raw key bytes, for sealing at rest
    pub fn secret_bytes(&self) -> SecureBytes {
        match self {
            KeyHandle::Ed25519(signing_key) => SecureBytes::new(signing_key.to_bytes().to_vec()),
            KeyHandle::Aes256Gcm(key) | KeyHandle::ChaCha20Poly1305(key) => key.clone(),
        }
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHandle({}, [REDACTED])", self.key_type())
    }
}

fn random_key() -> SecureBytes {
    let mut key = SecureBytes::zeros(KEY_SIZE);
    OsRng.fill_bytes(key.expose_mut());
    key
}
