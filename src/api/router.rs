use crate::api::handlers::{create_key, create_keystore, decrypt, encrypt, health, sign, verify};
use crate::api::middleware::correlation_middleware;
use crate::api::state::AppState;
use crate::errors::{KmsError, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/kms/keystores", post(create_keystore))
        .route("/kms/keystores/:keystore_id/keys", post(create_key))
        .route("/kms/keystores/:keystore_id/keys/:key_id/sign", post(sign))
        .route("/kms/keystores/:keystore_id/keys/:key_id/verify", post(verify))
        .route("/kms/keystores/:keystore_id/keys/:key_id/encrypt", post(encrypt))
        .route("/kms/keystores/:keystore_id/keys/:key_id/decrypt", post(decrypt))
        .route("/healthz", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            correlation_middleware,
        ))
        .with_state(state)
}

/// Serve `router` on `addr` until `shutdown` resolves
pub async fn run_http_server<F>(addr: SocketAddr, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| KmsError::ConfigError(format!("cannot bind {}: {}", addr, e)))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| {
            error!("HTTP server terminated unexpectedly: {}", e);
            KmsError::InternalError(e.to_string())
        })
}
