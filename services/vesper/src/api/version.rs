//! Software version endpoint.
use crate::api::error::{json_response, trace_id_from};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::json;

pub const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn version(headers: HeaderMap) -> Response {
    let trace_id = trace_id_from(&headers);
    json_response(
        StatusCode::OK,
        &trace_id,
        json!({"Version": format!("Vesper Server {SOFTWARE_VERSION}")}),
    )
}
