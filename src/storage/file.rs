//! File-backed storage provider
//!
//! Layout: `<root>/<store name>/<hex(record key)>`. Writes go to a temporary
//! file first and are moved into place, so readers never see a torn record.

use crate::errors::{KmsError, Result};
use crate::storage::{validate_store_name, Store, StorageProvider};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Suffix of in-flight writes; never a valid hex record name
const TMP_SUFFIX: &str = ".tmp";

/// One store directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Path of a record file
    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(hex::encode(key.as_bytes()))
    }

    /// Write `value` to a fresh temporary file in the store directory
    fn write_temp(&self, value: &[u8]) -> Result<PathBuf> {
        let tmp = self
            .dir
            .join(format!("{}{}", uuid::Uuid::new_v4().simple(), TMP_SUFFIX));
        fs::write(&tmp, value)?;
        Ok(tmp)
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        match fs::read(self.record_path(key)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(KmsError::RecordNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let tmp = self.write_temp(value)?;
        if let Err(e) = fs::rename(&tmp, self.record_path(key)) {
            remove_temp(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn insert(&self, key: &str, value: &[u8]) -> Result<()> {
        let tmp = self.write_temp(value)?;

        // link() refuses an existing target, which makes this put-if-absent atomic
        let result = fs::hard_link(&tmp, self.record_path(key));
        remove_temp(&tmp);

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(KmsError::RecordAlreadyExists(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Could not remove temporary file {:?}: {}", path, e);
    }
}

/// File-backed storage provider
pub struct FileStorageProvider {
    base_path: PathBuf,
}

impl FileStorageProvider {
    /// Create a provider rooted at `base_path`, creating the directory if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        Ok(Self { base_path })
    }

    fn store_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }
}

impl StorageProvider for FileStorageProvider {
    fn create_store(&self, name: &str) -> Result<()> {
        validate_store_name(name)?;

        match fs::create_dir(self.store_path(name)) {
            Ok(()) => {
                debug!("Created store directory: {}", name);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(KmsError::StoreAlreadyExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open_store(&self, name: &str) -> Result<Arc<dyn Store>> {
        validate_store_name(name)?;

        let dir = self.store_path(name);
        if !dir.is_dir() {
            return Err(KmsError::StoreNotFound(name.to_string()));
        }

        Ok(Arc::new(FileStore { dir }))
    }
}
