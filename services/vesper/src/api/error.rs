//! Reason-code mapping and response construction helpers.
//!
//! # Purpose
//! Every rejection leaves the service as a `(reasonCode, reasonString)`
//! pair under the endpoint's response envelope, with the request's
//! `Trace-Id` echoed (or generated) on the way out.
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::net::SocketAddr;
use vesper_passport::PassportError;
use vesper_passport::claims::uuid_v1;

pub const TRACE_ID_HEADER: &str = "Trace-Id";

// Conventional status for identity-verification rejections.
const VERIFICATION_FAILED: u16 = 438;

pub fn verification_failed_status() -> StatusCode {
    StatusCode::from_u16(VERIFICATION_FAILED).unwrap_or(StatusCode::BAD_REQUEST)
}

/// A request rejection ready to render: HTTP status plus the reason pair.
#[derive(Debug)]
pub struct Rejection {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl Rejection {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn from_passport(err: &PassportError) -> Self {
        let (code, status) = reason_for(err);
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<PassportError> for Rejection {
    fn from(err: PassportError) -> Self {
        Self::from_passport(&err)
    }
}

/// Maps a passport error to its reason code and HTTP status.
pub fn reason_for(err: &PassportError) -> (&'static str, StatusCode) {
    let verification = verification_failed_status();
    match err {
        PassportError::UnexpectedClaims(_) => ("VESPER-4004", StatusCode::BAD_REQUEST),
        PassportError::InvalidAttest(_) => ("VESPER-4005", StatusCode::BAD_REQUEST),
        PassportError::InvalidOrig(_) => ("VESPER-4006", StatusCode::BAD_REQUEST),
        PassportError::InvalidDest(_) => ("VESPER-4007", StatusCode::BAD_REQUEST),
        PassportError::InvalidIat(_) => ("VESPER-4008", StatusCode::BAD_REQUEST),
        PassportError::InvalidOrigid(_) => ("VESPER-4009", StatusCode::BAD_REQUEST),
        PassportError::InvalidIdentityHeader(_) => ("VESPER-4402", verification),
        PassportError::InvalidBase64 => ("VESPER-4403", verification),
        PassportError::InvalidPassportHeader(_) => ("VESPER-4404", verification),
        PassportError::InvalidCertificate(_) | PassportError::ChainValidation(_) => {
            ("VESPER-4407", verification)
        }
        PassportError::InvalidSignature | PassportError::SignatureMismatch => {
            ("VESPER-4408", verification)
        }
        PassportError::StaleIat { .. } => ("VESPER-4410", verification),
        PassportError::InvalidKey(_) => ("VESPER-5060", StatusCode::INTERNAL_SERVER_ERROR),
        PassportError::Json(_) => ("VESPER-5051", StatusCode::INTERNAL_SERVER_ERROR),
        PassportError::SigningFailure => ("VESPER-5052", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub fn trace_id_from(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("VESPER-{}", uuid_v1()))
}

pub fn client_ip(connect: Option<&ConnectInfo<SocketAddr>>) -> String {
    connect
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn json_response(status: StatusCode, trace_id: &str, body: Value) -> Response {
    let mut response = (status, axum::Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}
