//! Request correlation
//!
//! Each request runs inside a span (child of the state's root span) that
//! carries its method, path and request id. The id comes from `x-request-id`
//! when the caller sends one and is echoed back either way.

use crate::api::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn correlation_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        parent: &state.span,
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = %request_id,
    );

    let mut response = next.run(req).instrument(span.clone()).await;

    span.in_scope(|| debug!("Responded {}", response.status()));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
