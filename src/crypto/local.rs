//! Local crypto engine
//!
//! Provides:
//! - Ed25519 signing and strict verification
//! - AES-256-GCM and ChaCha20-Poly1305 authenticated encryption

use crate::crypto::{Crypto, KeyHandle};
use crate::errors::{KmsError, Result};
use aes_gcm::aead::{Aead, KeyInit, Nonce, Payload};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use ed25519_dalek::{Signature, Signer, SIGNATURE_LENGTH};
use rand::RngCore;

/// Nonce size shared by AES-GCM and ChaCha20-Poly1305
pub const NONCE_SIZE: usize = 12;

/// Stateless crypto engine over locally held key handles
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCrypto;

impl LocalCrypto {
    pub fn new() -> Self {
        Self
    }
}

impl Crypto for LocalCrypto {
    fn sign(&self, message: &[u8], key: &KeyHandle) -> Result<Vec<u8>> {
        match key {
            KeyHandle::Ed25519(signing_key) => Ok(signing_key.sign(message).to_bytes().to_vec()),
            other => Err(KmsError::SigningFailed(format!(
                "key type {} cannot sign",
                other.key_type()
            ))),
        }
    }

    fn verify(&self, signature: &[u8], message: &[u8], key: &KeyHandle) -> Result<()> {
        let signing_key = match key {
            KeyHandle::Ed25519(signing_key) => signing_key,
            other => {
                return Err(KmsError::VerificationFailed(format!(
                    "key type {} cannot verify",
                    other.key_type()
                )))
            }
        };

        let bytes: [u8; SIGNATURE_LENGTH] = signature.try_into().map_err(|_| {
            KmsError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LENGTH,
                signature.len()
            ))
        })?;

        signing_key
            .verifying_key()
            .verify_strict(message, &Signature::from_bytes(&bytes))
            .map_err(|_| KmsError::InvalidSignature("signature does not match message".to_string()))
    }

    fn encrypt(&self, message: &[u8], aad: &[u8], key: &KeyHandle) -> Result<(Vec<u8>, Vec<u8>)> {
        match key {
            KeyHandle::Aes256Gcm(raw) => seal::<Aes256Gcm>(raw.expose(), message, aad),
            KeyHandle::ChaCha20Poly1305(raw) => seal::<ChaCha20Poly1305>(raw.expose(), message, aad),
            other => Err(KmsError::EncryptionFailed(format!(
                "key type {} cannot encrypt",
                other.key_type()
            ))),
        }
    }

    fn decrypt(
        &self,
        cipher_text: &[u8],
        aad: &[u8],
        nonce: &[u8],
        key: &KeyHandle,
    ) -> Result<Vec<u8>> {
        match key {
            KeyHandle::Aes256Gcm(raw) => open::<Aes256Gcm>(raw.expose(), cipher_text, aad, nonce),
            KeyHandle::ChaCha20Poly1305(raw) => {
                open::<ChaCha20Poly1305>(raw.expose(), cipher_text, aad, nonce)
            }
            other => Err(KmsError::DecryptionFailed(format!(
                "key type {} cannot decrypt",
                other.key_type()
            ))),
        }
    }
}

fn seal<C: Aead + KeyInit>(key: &[u8], message: &[u8], aad: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let cipher =
        C::new_from_slice(key).map_err(|e| KmsError::EncryptionFailed(e.to_string()))?;

    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let cipher_text = cipher
        .encrypt(Nonce::<C>::from_slice(&nonce), Payload { msg: message, aad })
        .map_err(|e| KmsError::EncryptionFailed(e.to_string()))?;

    Ok((cipher_text, nonce.to_vec()))
}

fn open<C: Aead + KeyInit>(
    key: &[u8],
    cipher_text: &[u8],
    aad: &[u8],
    nonce: &[u8],
) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(KmsError::DecryptionFailed(format!(
            "expected {} byte nonce, got {}",
            NONCE_SIZE,
            nonce.len()
        )));
    }

    let cipher =
        C::new_from_slice(key).map_err(|e| KmsError::DecryptionFailed(e.to_string()))?;

    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), Payload { msg: cipher_text, aad })
        .map_err(|_| KmsError::DecryptionFailed("message authentication failed".to_string()))
}
