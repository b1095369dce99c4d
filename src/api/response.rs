//! Response codec
//!
//! Every handler answers through `write_json` or `ApiError`, so each request
//! produces exactly one response.

use crate::api::models::ErrorResponse;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt::Display;
use tracing::{error, warn};

pub const BAD_REQUEST: &str = "Received bad request: ";
pub const CREATE_KEYSTORE_FAILED: &str = "Failed to create a keystore: ";
pub const CREATE_PROVIDER_FAILED: &str = "Failed to create a kms provider: ";
pub const CREATE_KEY_FAILED: &str = "Failed to create a key: ";
pub const SIGN_FAILED: &str = "Failed to sign a message: ";
pub const VERIFY_FAILED: &str = "Failed to verify a message: ";
pub const ENCRYPT_FAILED: &str = "Failed to encrypt a message: ";
pub const DECRYPT_FAILED: &str = "Failed to decrypt a message: ";

/// An error body with its status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 for a body or field that could not be decoded
    pub fn bad_request(err: impl Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, format!("{}{}", BAD_REQUEST, err))
    }

    /// 500 for a failed step, logged at warn
    pub fn failure(prefix: &str, err: impl Display) -> Self {
        let message = format!("{}{}", prefix, err);
        warn!("{}", message);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        write_json(
            self.status,
            &ErrorResponse {
                err_message: self.message,
            },
        )
    }
}

/// Encode `body` as JSON; if that fails, log it and send the bare status
pub fn write_json<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => {
            error!("Failed to write response: {}", e);
            status.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde::ser::Error as _;
    use serde::Serializer;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cannot encode"))
        }
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ApiError::bad_request("EOF while parsing a value").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.err_message, "Received bad request: EOF while parsing a value");
    }

    #[test]
    fn test_failure_prefix() {
        let err = ApiError::failure(SIGN_FAILED, "key not found: k1");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to sign a message: key not found: k1");
    }

    #[tokio::test]
    async fn test_encode_failure_keeps_status_with_empty_body() {
        let response = write_json(StatusCode::OK, &Unencodable);
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}
