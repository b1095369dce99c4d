//! HTTP API for keyhub
//!
//! Provides:
//! - The operation dispatcher (one handler per KMS operation)
//! - The response codec
//! - Request correlation middleware

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod router;
pub mod state;

pub use router::{build_router, run_http_server};
pub use state::AppState;
