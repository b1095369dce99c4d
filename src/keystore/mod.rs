//! Keystore metadata
//!
//! - `repository`: persistence of keystore records and the locked key-id append
//! - `service`: keystore creation, the seam the dispatcher calls

pub mod repository;
pub mod service;

pub use repository::{Keystore, KeystoreLocks, Repository, StoreRepository, KEYSTORE_STORE};
pub use service::{DefaultKeystoreService, KeystoreService};
