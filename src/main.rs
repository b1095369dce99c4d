//! keyhub - HTTP key management service
//!
//! Creates keystores and keys, and signs, verifies, encrypts and decrypts
//! with those keys, without ever returning raw key material.
//!
//! # Security
//!
//! - Keys are sealed at rest with AES-256-GCM under a wrapping key derived
//!   from the caller's passphrase with Argon2id
//! - Unsealed keys live only for the request that needs them
//! - All sensitive memory is zeroed on drop
//!
//! # Usage
//!
//! ```bash
//! # Start the server with defaults
//! keyhub
//!
//! # Or with a config file and a port override
//! keyhub --config /etc/keyhub/config.toml --port 9000
//! ```

mod api;
mod config;
mod crypto;
mod errors;
mod keystore;
mod kms;
mod provider;
mod security;
mod storage;

use crate::api::{build_router, run_http_server, AppState};
use crate::config::{Config, LoggingConfig, StorageBackend};
use crate::crypto::LocalCrypto;
use crate::errors::{KmsError, Result};
use crate::keystore::{DefaultKeystoreService, KeystoreLocks};
use crate::kms::LocalKeyManagerCreator;
use crate::provider::ProviderFactory;
use crate::storage::{FileStorageProvider, MemoryStorageProvider, StorageProvider};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, info_span, warn};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "keyhub", version, about = "HTTP key management service")]
struct Args {
    /// Path to a config file
    #[arg(long, env = "KEYHUB_CONFIG")]
    config: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config.logging);

    info!("Starting keyhub v{}", VERSION);

    config.validate()?;
    info!("Configuration loaded");

    let storage = open_storage(&config)?;
    let locks = Arc::new(KeystoreLocks::new());

    let providers = Arc::new(ProviderFactory::new(
        storage.clone(),
        Arc::new(LocalKeyManagerCreator::new(storage.clone(), config.kdf.clone())),
        Arc::new(LocalCrypto::new()),
        locks.clone(),
    ));
    let keystores = Arc::new(DefaultKeystoreService::new(storage, locks));

    let state = Arc::new(AppState::new(
        keystores,
        providers,
        config.server.public_host.clone(),
        info_span!("kms.ops"),
    ));

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| KmsError::ConfigError(format!("Invalid address: {}", e)))?;

    let router = build_router(state, config.server.max_body_bytes);
    run_http_server(addr, router, shutdown_signal()).await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Build the configured storage provider
fn open_storage(config: &Config) -> Result<Arc<dyn StorageProvider>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage, keys will not survive a restart");
            Ok(Arc::new(MemoryStorageProvider::new()))
        }
        StorageBackend::File => {
            let path = config.storage.path.as_ref().ok_or_else(|| {
                KmsError::ConfigError("file storage backend requires storage.path".to_string())
            })?;
            info!("Using file storage at {:?}", path);
            Ok(Arc::new(FileStorageProvider::new(path)?))
        }
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
