//! Handling of sensitive in-memory values
//!
//! Key material, wrapping keys and passphrases are wrapped in types that
//! zero their memory on drop and never print their contents.

pub mod zeroize;

pub use zeroize::{SecureBytes, SecureString};
