//! PASSporT verification endpoint.
//!
//! Pipeline: request shape -> Identity header parse -> STI-CR host check ->
//! public-key resolution -> chain validation against the current root pool
//! -> signature check over the received segments -> claim validation ->
//! replay admit-or-reject.
use crate::api::error::{
    self, Rejection, json_response, trace_id_from, verification_failed_status,
};
use crate::app::AppState;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Instant;
use vesper_passport::{claims, crypto, identity};

const MODULE: &str = "verifyRequest";

const REQUEST_FIELDS: [&str; 4] = ["identity", "orig", "dest", "iat"];

pub async fn verify_request(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let trace_id = trace_id_from(&headers);
    let client_ip = error::client_ip(connect.as_ref());

    match verify_inner(&state, &body).await {
        Ok(x5u) => {
            tracing::info!(
                trace = %trace_id,
                client_ip = %client_ip,
                module = MODULE,
                elapsed = ?start.elapsed(),
                "verification request complete"
            );
            json_response(
                StatusCode::OK,
                &trace_id,
                json!({"verificationResponse": {
                    "verstat": "TN-Validation-Passed",
                    "x5u": x5u,
                }}),
            )
        }
        Err(rejection) => {
            tracing::error!(
                trace = %trace_id,
                client_ip = %client_ip,
                module = MODULE,
                reason_code = rejection.code,
                reason_string = %rejection.message,
                "verification request rejected"
            );
            json_response(
                rejection.status,
                &trace_id,
                json!({"verificationResponse": {
                    "reasonCode": rejection.code,
                    "reasonString": rejection.message,
                }}),
            )
        }
    }
}

async fn verify_inner(state: &AppState, body: &[u8]) -> Result<String, Rejection> {
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
    let verification = request
        .get("verificationRequest")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            Rejection::new(
                StatusCode::BAD_REQUEST,
                "VESPER-4003",
                "\"verificationRequest\" object missing in request body",
            )
        })?;
    for field in verification.keys() {
        if !REQUEST_FIELDS.contains(&field.as_str()) {
            return Err(Rejection::new(
                StatusCode::BAD_REQUEST,
                "VESPER-4004",
                format!("unexpected field {field}"),
            ));
        }
    }

    let identity_value = verification
        .get("identity")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            Rejection::new(
                verification_failed_status(),
                "VESPER-4401",
                "\"identity\" field missing or empty",
            )
        })?;
    let request_orig = claims::parse_orig(verification.get("orig")).map_err(Rejection::from)?;
    let request_dest = claims::parse_dest(verification.get("dest")).map_err(Rejection::from)?;
    claims::parse_iat(verification.get("iat").unwrap_or(&Value::Null))
        .map_err(Rejection::from)?;

    let parsed = identity::parse(identity_value).map_err(Rejection::from)?;
    let header = parsed.jws.header().map_err(Rejection::from)?;
    if header.x5u != parsed.info_url {
        return Err(Rejection::new(
            verification_failed_status(),
            "VESPER-4405",
            "info parameter does not match the passport x5u",
        ));
    }
    let sticr_host = state.sticr.snapshot();
    if !header.x5u.starts_with(sticr_host.as_str()) {
        return Err(Rejection::new(
            verification_failed_status(),
            "VESPER-4405",
            "x5u is not served by the configured STI-CR host",
        ));
    }

    let cached = state.pubkeys.resolve(&header.x5u).await.map_err(|err| {
        Rejection::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "VESPER-5060",
            format!("unable to fetch certificate chain: {err:#}"),
        )
    })?;
    let now = crate::now_epoch_seconds();
    let roots = state.roots.snapshot();
    crypto::validate_chain(&cached.leaf, &cached.intermediates, &roots, now)
        .map_err(Rejection::from)?;

    let signature = parsed.jws.signature().map_err(Rejection::from)?;
    crypto::verify_es256(&cached.key, parsed.jws.signing_input().as_bytes(), &signature)
        .map_err(Rejection::from)?;

    let payload = parsed.jws.payload_object().map_err(Rejection::from)?;
    let claims = claims::validate_verification(
        &payload,
        now,
        state.config.freshness_window_seconds,
    )
    .map_err(Rejection::from)?;
    if claims.orig != request_orig || claims.dest != request_dest {
        return Err(Rejection::new(
            verification_failed_status(),
            "VESPER-4406",
            "request claims do not match the passport payload",
        ));
    }

    let fingerprint = claims.fingerprint().map_err(Rejection::from)?;
    let expiry = claims.iat + state.config.freshness_window_seconds;
    state
        .replay
        .admit(fingerprint, expiry, now)
        .map_err(|_| {
            Rejection::new(
                verification_failed_status(),
                "VESPER-4409",
                "duplicate claims within the freshness window",
            )
        })?;

    Ok(header.x5u)
}
