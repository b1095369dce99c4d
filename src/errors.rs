//! Error types for keyhub

use thiserror::Error;

/// Main error type for keyhub operations
#[derive(Error, Debug)]
pub enum KmsError {
    // Storage errors
    #[error("store not found: {0}")]
    StoreNotFound(String),

    #[error("store already exists: {0}")]
    StoreAlreadyExists(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("record already exists: {0}")]
    RecordAlreadyExists(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    // Keystore errors
    #[error("keystore not found: {0}")]
    KeystoreNotFound(String),

    // Key management errors
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("invalid passphrase for keystore {0}")]
    InvalidPassphrase(String),

    // Cryptographic errors
    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    ConfigError(String),

    // Internal errors
    #[error("internal error: {0}")]
    InternalError(String),
}

impl KmsError {
    /// True when a verification ran and rejected the signature
    pub fn is_invalid_signature(&self) -> bool {
        matches!(self, KmsError::InvalidSignature(_))
    }
}

impl From<std::io::Error> for KmsError {
    fn from(err: std::io::Error) -> Self {
        KmsError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for KmsError {
    fn from(err: serde_json::Error) -> Self {
        KmsError::DecodeError(err.to_string())
    }
}

impl From<base64::DecodeError> for KmsError {
    fn from(err: base64::DecodeError) -> Self {
        KmsError::DecodeError(format!("base64: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, KmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_signature_is_distinguished() {
        assert!(KmsError::InvalidSignature("bad".to_string()).is_invalid_signature());
        assert!(!KmsError::VerificationFailed("bad".to_string()).is_invalid_signature());
        assert!(!KmsError::KeyNotFound("k1".to_string()).is_invalid_signature());
    }

    #[test]
    fn test_json_error_maps_to_decode_error() {
        let err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err: KmsError = err.into();
        assert!(matches!(err, KmsError::DecodeError(_)));
    }
}
