//! PASSporT signing endpoint.
use crate::api::error::{self, Rejection, json_response, trace_id_from};
use crate::app::AppState;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Instant;
use vesper_passport::{claims, crypto, identity, jws};

const MODULE: &str = "signRequest";

pub async fn sign_request(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let trace_id = trace_id_from(&headers);
    let client_ip = error::client_ip(connect.as_ref());

    match sign_inner(&state, &body) {
        Ok(identity_header) => {
            tracing::info!(
                trace = %trace_id,
                client_ip = %client_ip,
                module = MODULE,
                elapsed = ?start.elapsed(),
                "signing request complete"
            );
            json_response(
                StatusCode::OK,
                &trace_id,
                json!({"signingResponse": {"identity": identity_header}}),
            )
        }
        Err(rejection) => {
            tracing::error!(
                trace = %trace_id,
                client_ip = %client_ip,
                module = MODULE,
                reason_code = rejection.code,
                reason_string = %rejection.message,
                "signing request rejected"
            );
            json_response(
                rejection.status,
                &trace_id,
                json!({"signingResponse": {
                    "reasonCode": rejection.code,
                    "reasonString": rejection.message,
                }}),
            )
        }
    }
}

fn sign_inner(state: &AppState, body: &[u8]) -> Result<String, Rejection> {
    if body.is_empty() {
        return Err(Rejection::new(
            StatusCode::BAD_REQUEST,
            "VESPER-4001",
            "empty request body",
        ));
    }
    let request: Value = serde_json::from_slice(body).map_err(|_| {
        Rejection::new(
            StatusCode::BAD_REQUEST,
            "VESPER-4002",
            "unable to parse request body",
        )
    })?;
    let claim_object = request
        .get("signingRequest")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            Rejection::new(
                StatusCode::BAD_REQUEST,
                "VESPER-4003",
                "\"signingRequest\" object missing in request body",
            )
        })?;
    let claims = claims::validate_signing(claim_object, crate::now_epoch_seconds())
        .map_err(Rejection::from)?;

    let credentials = state.signing.snapshot();
    if credentials.x5u.is_empty() {
        return Err(Rejection::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "VESPER-5053",
            "signing credentials unavailable",
        ));
    }
    let header = jws::PassportHeader::new(credentials.x5u.clone());
    let header_json = serde_json::to_string(&header).map_err(|_| {
        Rejection::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "VESPER-5050",
            "error serializing passport header",
        )
    })?;
    let claims_json = claims.canonical_json().map_err(|_| {
        Rejection::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "VESPER-5051",
            "error serializing claims",
        )
    })?;
    let signing_input = jws::signing_input(&header_json, &claims_json);
    let signature = crypto::sign_es256(&credentials.key, signing_input.as_bytes()).map_err(|_| {
        Rejection::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "VESPER-5052",
            "error signing request",
        )
    })?;
    let token = format!("{signing_input}.{}", jws::b64url_encode(&signature));
    Ok(identity::assemble(&token, &credentials.x5u))
}
