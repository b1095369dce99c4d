//! Operation dispatcher
//!
//! Every handler follows the same steps and stops at the first failure:
//! parse the body (and any base64 fields), build a provider bundle for the
//! keystore, run the operation, encode the result.

use crate::api::models::{
    decode_b64, encode_b64, CreateKeyReq, CreateKeystoreReq, DecryptReq, DecryptResp, EncryptReq,
    EncryptResp, HealthResp, SignReq, SignResp, VerifyReq, VerifyResp,
};
use crate::api::response::{
    write_json, ApiError, CREATE_KEYSTORE_FAILED, CREATE_KEY_FAILED, CREATE_PROVIDER_FAILED,
    DECRYPT_FAILED, ENCRYPT_FAILED, SIGN_FAILED, VERIFY_FAILED,
};
use crate::api::state::AppState;
use crate::kms::{KmsService, VerifyOutcome};
use crate::security::SecureString;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, info, Span};

type ApiResult = Result<Response, ApiError>;

/// Decode a JSON body; an unreadable body (e.g. over the size limit) is a bad request too
fn parse<T: DeserializeOwned>(body: Result<Bytes, BytesRejection>) -> Result<T, ApiError> {
    let body = body.map_err(ApiError::bad_request)?;
    serde_json::from_slice(&body).map_err(ApiError::bad_request)
}

fn path_params<T>(path: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    path.map(|Path(params)| params).map_err(ApiError::bad_request)
}

fn parse_b64(value: &str) -> Result<Vec<u8>, ApiError> {
    decode_b64(value).map_err(ApiError::bad_request)
}

/// `<host><path>`, host taken from the request when it has one
fn location(headers: &HeaderMap, state: &AppState, path: &str) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or(&state.public_host);
    format!("{}{}", host, path)
}

fn created(location: String) -> ApiResult {
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
}

fn provision(state: &AppState, keystore_id: &str, passphrase: SecureString) -> Result<KmsService, ApiError> {
    state
        .providers
        .build(keystore_id, passphrase)
        .map(KmsService::new)
        .map_err(|e| ApiError::failure(CREATE_PROVIDER_FAILED, e))
}

/// Run storage and crypto work off the async workers, inside the request span
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f))
        .await
        .map_err(|e| {
            error!("Request task failed: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "request task failed")
        })?
}

pub async fn create_keystore(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult {
    let req: CreateKeystoreReq = parse(body)?;
    if req.controller.is_empty() {
        return Err(ApiError::bad_request("controller is required"));
    }

    let keystores = state.keystores.clone();
    let keystore_id = run_blocking(move || {
        keystores
            .create(&req.controller)
            .map_err(|e| ApiError::failure(CREATE_KEYSTORE_FAILED, e))
    })
    .await?;

    created(location(
        &headers,
        &state,
        &format!("/kms/keystores/{}", keystore_id),
    ))
}

pub async fn create_key(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult {
    let keystore_id = path_params(path)?;
    let req: CreateKeyReq = parse(body)?;

    let task_state = state.clone();
    let task_keystore_id = keystore_id.clone();
    let key_id = run_blocking(move || {
        let kms = provision(&task_state, &task_keystore_id, req.passphrase)?;
        kms.create_key(&task_keystore_id, &req.key_type)
            .map_err(|e| ApiError::failure(CREATE_KEY_FAILED, e))
    })
    .await?;

    created(location(
        &headers,
        &state,
        &format!("/kms/keystores/{}/keys/{}", keystore_id, key_id),
    ))
}

pub async fn sign(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult {
    let (keystore_id, key_id) = path_params(path)?;
    let req: SignReq = parse(body)?;

    let signature = run_blocking(move || {
        let kms = provision(&state, &keystore_id, req.passphrase)?;
        kms.sign(&key_id, req.message.as_bytes())
            .map_err(|e| ApiError::failure(SIGN_FAILED, e))
    })
    .await?;

    Ok(write_json(
        StatusCode::OK,
        &SignResp {
            signature: encode_b64(&signature),
        },
    ))
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult {
    let (keystore_id, key_id) = path_params(path)?;
    let req: VerifyReq = parse(body)?;
    let signature = parse_b64(&req.signature)?;

    let outcome = run_blocking(move || {
        let kms = provision(&state, &keystore_id, req.passphrase)?;
        Ok(kms.verify(&key_id, &signature, req.message.as_bytes()))
    })
    .await?;

    match outcome {
        VerifyOutcome::Verified => Ok(write_json(StatusCode::OK, &VerifyResp {})),
        VerifyOutcome::Rejected(e) => {
            info!("Signature rejected: {}", e);
            Ok(ApiError::new(StatusCode::OK, format!("{}{}", VERIFY_FAILED, e)).into_response())
        }
        VerifyOutcome::Failed(e) => Err(ApiError::failure(VERIFY_FAILED, e)),
    }
}

pub async fn encrypt(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult {
    let (keystore_id, key_id) = path_params(path)?;
    let req: EncryptReq = parse(body)?;

    let (cipher_text, nonce) = run_blocking(move || {
        let kms = provision(&state, &keystore_id, req.passphrase)?;
        kms.encrypt(&key_id, req.message.as_bytes(), req.aad.as_bytes())
            .map_err(|e| ApiError::failure(ENCRYPT_FAILED, e))
    })
    .await?;

    Ok(write_json(
        StatusCode::OK,
        &EncryptResp {
            cipher_text: encode_b64(&cipher_text),
            nonce: encode_b64(&nonce),
        },
    ))
}

pub async fn decrypt(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult {
    let (keystore_id, key_id) = path_params(path)?;
    let req: DecryptReq = parse(body)?;
    let cipher_text = parse_b64(&req.cipher_text)?;
    let nonce = parse_b64(&req.nonce)?;

    let plain_text = run_blocking(move || {
        let kms = provision(&state, &keystore_id, req.passphrase)?;
        kms.decrypt(&key_id, &cipher_text, req.aad.as_bytes(), &nonce)
            .map_err(|e| ApiError::failure(DECRYPT_FAILED, e))
    })
    .await?;

    Ok(write_json(
        StatusCode::OK,
        &DecryptResp {
            plain_text: String::from_utf8_lossy(&plain_text).into_owned(),
        },
    ))
}

pub async fn health() -> Response {
    write_json(StatusCode::OK, &HealthResp { status: "ok" })
}
