//! Configuration management for keyhub
//!
//! Supports loading configuration from:
//! - Built-in defaults
//! - Config file (config.toml)
//! - Environment variables (KEYHUB_*)

use crate::errors::{KmsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Storage backend configuration
    pub storage: StorageConfig,

    /// Passphrase key derivation parameters
    pub kdf: KdfConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for TCP
    pub listen_addr: String,

    /// Port number
    pub port: u16,

    /// Host used in Location headers when a request carries no Host header
    pub public_host: String,

    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            port: 8077,
            public_host: "localhost:8077".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Which storage provider backs keystores and sealed keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend type
    pub backend: StorageBackend,

    /// Root directory for the file backend
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: Some(PathBuf::from("./data/kms")),
        }
    }
}

/// Argon2id parameters used to derive a keystore's wrapping key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Parallel lanes
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())
            .map_err(|e| KmsError::ConfigError(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        } else {
            builder = builder
                .add_source(config::File::with_name("config").required(false))
                .add_source(config::File::with_name("/etc/keyhub/config").required(false));
        }

        // KEYHUB_SERVER__PORT, KEYHUB_STORAGE__BACKEND, ...
        builder = builder.add_source(
            config::Environment::with_prefix("KEYHUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| KmsError::ConfigError(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| KmsError::ConfigError(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(KmsError::ConfigError("server port must not be 0".to_string()));
        }

        if self.server.max_body_bytes == 0 {
            return Err(KmsError::ConfigError(
                "server max_body_bytes must not be 0".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::File {
            match &self.storage.path {
                None => {
                    return Err(KmsError::ConfigError(
                        "file storage backend requires storage.path".to_string(),
                    ))
                }
                Some(path) if !path.exists() => {
                    info!("Storage directory does not exist, will create: {:?}", path);
                }
                Some(_) => {}
            }
        }

        argon2::Params::new(
            self.kdf.memory_kib,
            self.kdf.iterations,
            self.kdf.parallelism,
            None,
        )
        .map_err(|e| KmsError::ConfigError(format!("invalid kdf parameters: {}", e)))?;

        match self.logging.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(KmsError::ConfigError(format!(
                "unknown log format: {}",
                other
            ))),
        }
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.listen_addr, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8077);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_addr() {
        let config = Config::default();
        assert_eq!(config.server_addr(), "127.0.0.1:8077");
    }

    #[test]
    fn test_file_backend_requires_path() {
        let mut config = Config::default();
        config.storage.path = None;
        assert!(matches!(config.validate(), Err(KmsError::ConfigError(_))));

        config.storage.backend = StorageBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unusable_kdf_parameters() {
        let mut config = Config::default();
        config.kdf.parallelism = 0;
        assert!(matches!(config.validate(), Err(KmsError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        std::env::set_var("KEYHUB_SERVER__PORT", "9191");
        std::env::set_var("KEYHUB_STORAGE__BACKEND", "memory");
        let config = Config::load(None);
        std::env::remove_var("KEYHUB_SERVER__PORT");
        std::env::remove_var("KEYHUB_STORAGE__BACKEND");

        let config = config.unwrap();
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.server.listen_addr, "127.0.0.1");
    }
}
