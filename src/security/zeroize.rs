//! Zero-on-drop wrappers for secrets
//!
//! Uses the `zeroize` crate so the compiler cannot elide the final wipe.

use serde::Deserialize;
use std::fmt;
use zeroize::ZeroizeOnDrop;

/// Sensitive bytes (raw symmetric keys, derived wrapping keys, unsealed seeds)
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureBytes {
    inner: Vec<u8>,
}

impl SecureBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self { inner: data }
    }

    pub fn zeros(size: usize) -> Self {
        Self {
            inner: vec![0u8; size],
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn expose(&self) -> &[u8] {
        &self.inner
    }

    pub fn expose_mut(&mut self) -> &mut [u8] {
        &mut self.inner
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for SecureBytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes([REDACTED; {}])", self.inner.len())
    }
}

/// A passphrase as it arrives on the wire; wiped when the request ends
#[derive(Clone, Default, Deserialize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    pub fn expose(&self) -> &str {
        &self.inner
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_bytes_access() {
        let mut secure = SecureBytes::zeros(4);
        assert_eq!(secure.len(), 4);
        assert!(!secure.is_empty());

        secure.expose_mut().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(secure.expose(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_debug_never_prints_contents() {
        let bytes = SecureBytes::new(vec![0xde, 0xad]);
        assert_eq!(format!("{:?}", bytes), "SecureBytes([REDACTED; 2])");

        let secret = SecureString::from("hunter2");
        assert!(!format!("{:?}", secret).contains("hunter2"));
    }

    #[test]
    fn test_secure_string_deserializes_from_plain_json_string() {
        let secret: SecureString = serde_json::from_str("\"my_secret_password\"").unwrap();
        assert_eq!(secret.expose(), "my_secret_password");
    }
}
