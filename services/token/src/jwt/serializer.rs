//! Compact token splitting ahead of signature checks.

use crate::error::VerifyError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

/// A token split into its segments, with header and payload decoded.
///
/// The `alg` value is kept as written so an algorithm this crate does not
/// know still reads as a mismatch rather than a malformed token.
#[derive(Debug)]
pub struct RawToken<'a> {
    signing_input: &'a str,
    signature: &'a str,
    algorithm: Option<String>,
    payload: Value,
}

impl<'a> RawToken<'a> {
    /// Split `token` into `header.payload.signature` and decode the parts.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::TokenMalformed`] for a wrong segment count,
    /// bad base64url, or a header or payload that is not a JSON object.
    pub fn parse(token: &'a str) -> Result<Self, VerifyError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(VerifyError::malformed("token contains an invalid number of segments"));
        };

        let header = decode_segment("header", header)?;
        let payload = decode_segment("payload", payload)?;
        decode_segment("signature", signature)?;

        let mut header = decode_object("header", &header)?;
        let algorithm = match header.remove("alg") {
            Some(Value::String(alg)) => Some(alg),
            _ => None,
        };
        let payload = Value::Object(decode_object("payload", &payload)?);

        let signing_input = &token[..token.len() - signature.len() - 1];

        Ok(Self {
            signing_input,
            signature,
            algorithm,
            payload,
        })
    }

    /// `header.payload`, the bytes the signature covers.
    #[must_use]
    pub const fn signing_input(&self) -> &'a str {
        self.signing_input
    }

    /// Signature segment, still base64url encoded.
    #[must_use]
    pub const fn signature(&self) -> &'a str {
        self.signature
    }

    /// Declared `alg` header.
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    /// Decoded payload, always a JSON object.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Take the decoded payload.
    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }
}

fn decode_object(name: &str, bytes: &[u8]) -> Result<Map<String, Value>, VerifyError> {
    serde_json::from_slice(bytes).map_err(|e| VerifyError::malformed(format!("{name}: {e}")))
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>, VerifyError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| VerifyError::malformed(format!("{name}: {e}")))
}
