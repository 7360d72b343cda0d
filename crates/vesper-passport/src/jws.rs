//! Compact JWS codec for PASSporT tokens.
//!
//! The signing input is always `b64url(header).b64url(payload)`. On the
//! verification path the received base64url segments are used exactly as
//! received and never re-encoded, so byte-level differences in the sender's
//! JSON encoding cannot break signature checks.
use crate::errors::PassportError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// PASSporT protected header. Field declaration order is the fixed wire
/// order: `alg`, `ppt`, `typ`, `x5u`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassportHeader {
    pub alg: String,
    pub ppt: String,
    pub typ: String,
    pub x5u: String,
}

impl PassportHeader {
    pub fn new(x5u: impl Into<String>) -> Self {
        Self {
            alg: "ES256".to_string(),
            ppt: "shaken".to_string(),
            typ: "passport".to_string(),
            x5u: x5u.into(),
        }
    }

    fn check(&self) -> Result<(), PassportError> {
        if self.alg != "ES256" {
            return Err(PassportError::InvalidPassportHeader(format!(
                "alg must be ES256, got {}",
                self.alg
            )));
        }
        if self.ppt != "shaken" {
            return Err(PassportError::InvalidPassportHeader(format!(
                "ppt must be shaken, got {}",
                self.ppt
            )));
        }
        if self.typ != "passport" {
            return Err(PassportError::InvalidPassportHeader(format!(
                "typ must be passport, got {}",
                self.typ
            )));
        }
        if self.x5u.is_empty() {
            return Err(PassportError::InvalidPassportHeader(
                "x5u must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn b64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn b64url_decode(data: &str) -> Result<Vec<u8>, PassportError> {
    URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|_| PassportError::InvalidBase64)
}

/// Builds the canonical signing input from freshly serialized header and
/// payload JSON.
pub fn signing_input(header_json: &str, payload_json: &str) -> String {
    format!(
        "{}.{}",
        b64url_encode(header_json.as_bytes()),
        b64url_encode(payload_json.as_bytes())
    )
}

/// A compact JWS split into its three base64url segments, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactJws {
    pub header_b64: String,
    pub payload_b64: String,
    pub signature_b64: String,
}

impl CompactJws {
    pub fn parse(token: &str) -> Result<Self, PassportError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(PassportError::InvalidIdentityHeader(
                "JWS token must have exactly three segments".to_string(),
            ));
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(PassportError::InvalidIdentityHeader(
                "JWS token segments must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            header_b64: header.to_string(),
            payload_b64: payload.to_string(),
            signature_b64: signature.to_string(),
        })
    }

    /// The exact bytes the sender signed: the received segments, unmodified.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header_b64, self.payload_b64)
    }

    pub fn header(&self) -> Result<PassportHeader, PassportError> {
        let bytes = b64url_decode(&self.header_b64)?;
        let header: PassportHeader = serde_json::from_slice(&bytes).map_err(|err| {
            PassportError::InvalidPassportHeader(format!("header is not valid JSON: {err}"))
        })?;
        header.check()?;
        Ok(header)
    }

    pub fn payload_object(&self) -> Result<Map<String, Value>, PassportError> {
        let bytes = b64url_decode(&self.payload_b64)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|err| {
            PassportError::InvalidPassportHeader(format!("payload is not valid JSON: {err}"))
        })?;
        match value {
            Value::Object(object) => Ok(object),
            _ => Err(PassportError::InvalidPassportHeader(
                "payload is not a JSON object".to_string(),
            )),
        }
    }

    pub fn signature(&self) -> Result<Vec<u8>, PassportError> {
        b64url_decode(&self.signature_b64)
    }
}
