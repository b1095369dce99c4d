//! Wire types
//!
//! Field names are part of the HTTP contract.

use crate::security::SecureString;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// URL-safe base64; padded on output, padding optional on input
pub const B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn encode_b64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

pub fn decode_b64(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    B64.decode(value)
}

#[derive(Debug, Deserialize)]
pub struct CreateKeystoreReq {
    pub controller: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyReq {
    pub key_type: String,
    #[serde(default)]
    pub passphrase: SecureString,
}

#[derive(Deserialize)]
pub struct SignReq {
    pub message: String,
    #[serde(default)]
    pub passphrase: SecureString,
}

#[derive(Debug, Serialize)]
pub struct SignResp {
    pub signature: String,
}

#[derive(Deserialize)]
pub struct VerifyReq {
    pub signature: String,
    pub message: String,
    #[serde(default)]
    pub passphrase: SecureString,
}

/// Body of a successful verify
#[derive(Debug, Serialize)]
pub struct VerifyResp {}

#[derive(Deserialize)]
pub struct EncryptReq {
    pub message: String,
    pub aad: String,
    #[serde(default)]
    pub passphrase: SecureString,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptResp {
    pub cipher_text: String,
    pub nonce: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptReq {
    pub cipher_text: String,
    pub aad: String,
    pub nonce: String,
    #[serde(default)]
    pub passphrase: SecureString,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptResp {
    pub plain_text: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResp {
    pub status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub err_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_b64_pads_output_and_accepts_unpadded_input() {
        assert_eq!(encode_b64(b"ab"), "YWI=");
        assert_eq!(decode_b64("YWI=").unwrap(), b"ab");
        assert_eq!(decode_b64("YWI").unwrap(), b"ab");
    }

    #[test]
    fn test_b64_is_url_safe() {
        assert_eq!(encode_b64(&[0xfb, 0xff]), "-_8=");
        assert!(decode_b64("+/8=").is_err());
    }

    #[test]
    fn test_passphrase_is_optional() {
        let req: SignReq = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(req.passphrase.expose(), "");

        let req: CreateKeyReq =
            serde_json::from_str(r#"{"keyType":"ED25519","passphrase":"p4ss"}"#).unwrap();
        assert_eq!(req.key_type, "ED25519");
        assert_eq!(req.passphrase.expose(), "p4ss");
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(EncryptResp {
            cipher_text: "c".to_string(),
            nonce: "n".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"cipherText": "c", "nonce": "n"}));

        let json = serde_json::to_value(VerifyResp {}).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let json = serde_json::to_value(ErrorResponse {
            err_message: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"errMessage": "boom"}));
    }
}
