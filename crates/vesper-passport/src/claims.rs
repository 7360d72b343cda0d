//! SHAKEN claim set validation and canonical serialization.
//!
//! # Purpose
//! Normalizes signing/verification payloads into a claim map whose JSON
//! encoding is deterministic: keys always appear in sorted order
//! (`attest`, `dest`, `iat`, `orig`, `origid`), which makes the encoding
//! usable both as the JWS payload and as the replay fingerprint input.
use crate::errors::PassportError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Default acceptable `|now - iat|` bound, in seconds. Doubles as the
/// replay-cache retention period.
pub const DEFAULT_FRESHNESS_WINDOW_SECONDS: i64 = 60;

const ALLOWED_CLAIMS: [&str; 5] = ["attest", "dest", "iat", "orig", "origid"];

// Node identifier for v1 UUIDs minted by this service (origid, trace ids).
const UUID_NODE_ID: [u8; 6] = *b"vesper";

pub fn uuid_v1() -> Uuid {
    Uuid::now_v1(&UUID_NODE_ID)
}

/// Attestation level assigned by the originating carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attest {
    A,
    B,
    C,
}

/// Originating identity: exactly one of a telephone number or a URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orig {
    Tn(String),
    Uri(String),
}

/// Destination identities: exactly one of an ordered telephone-number list
/// or an ordered URI list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dest {
    Tn(Vec<String>),
    Uri(Vec<String>),
}

/// The full SHAKEN claim set. Field declaration order is the sorted key
/// order, so `serde_json` emits the canonical encoding directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassportClaims {
    pub attest: Attest,
    pub dest: Dest,
    pub iat: i64,
    pub orig: Orig,
    pub origid: String,
}

impl PassportClaims {
    pub fn canonical_json(&self) -> Result<String, PassportError> {
        Ok(serde_json::to_string(self)?)
    }

    /// SHA-256 of the canonical JSON encoding. Semantically equivalent
    /// payloads fingerprint identically regardless of received key order.
    pub fn fingerprint(&self) -> Result<[u8; 32], PassportError> {
        let canonical = self.canonical_json()?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hasher.finalize().into())
    }
}

/// Validates a signing request's claim object. Missing `iat` is stamped
/// with `now`; missing `origid` gets a freshly minted v1 UUID.
pub fn validate_signing(
    claims: &Map<String, Value>,
    now: i64,
) -> Result<PassportClaims, PassportError> {
    check_claim_names(claims, false)?;
    let attest = parse_attest(claims.get("attest"))?;
    let orig = parse_orig(claims.get("orig"))?;
    let dest = parse_dest(claims.get("dest"))?;
    let iat = match claims.get("iat") {
        Some(value) => parse_iat(value)?,
        None => now,
    };
    let origid = match claims.get("origid") {
        Some(value) => parse_origid(value)?,
        None => uuid_v1().to_string(),
    };
    Ok(PassportClaims {
        attest,
        dest,
        iat,
        orig,
        origid,
    })
}

/// Validates a claim object extracted from a received JWS payload. All five
/// claims must be present and `iat` must fall within the freshness window.
pub fn validate_verification(
    claims: &Map<String, Value>,
    now: i64,
    freshness_window: i64,
) -> Result<PassportClaims, PassportError> {
    check_claim_names(claims, true)?;
    let attest = parse_attest(claims.get("attest"))?;
    let orig = parse_orig(claims.get("orig"))?;
    let dest = parse_dest(claims.get("dest"))?;
    let iat = parse_iat(claims.get("iat").unwrap_or(&Value::Null))?;
    if (now - iat).abs() > freshness_window {
        return Err(PassportError::StaleIat { iat, now });
    }
    let origid = parse_origid(claims.get("origid").unwrap_or(&Value::Null))?;
    Ok(PassportClaims {
        attest,
        dest,
        iat,
        orig,
        origid,
    })
}

fn check_claim_names(claims: &Map<String, Value>, require_all: bool) -> Result<(), PassportError> {
    for name in claims.keys() {
        if !ALLOWED_CLAIMS.contains(&name.as_str()) {
            return Err(PassportError::UnexpectedClaims(format!(
                "unexpected claim {name}"
            )));
        }
    }
    let required: &[&str] = if require_all {
        &ALLOWED_CLAIMS
    } else {
        &["attest", "dest", "orig"]
    };
    for name in required {
        if !claims.contains_key(*name) {
            return Err(PassportError::UnexpectedClaims(format!(
                "missing claim {name}"
            )));
        }
    }
    Ok(())
}

fn parse_attest(value: Option<&Value>) -> Result<Attest, PassportError> {
    match value.and_then(Value::as_str) {
        Some("A") => Ok(Attest::A),
        Some("B") => Ok(Attest::B),
        Some("C") => Ok(Attest::C),
        Some(other) => Err(PassportError::InvalidAttest(format!(
            "{other} is not one of A, B, C"
        ))),
        None => Err(PassportError::InvalidAttest(
            "attest must be a string".to_string(),
        )),
    }
}

pub fn parse_orig(value: Option<&Value>) -> Result<Orig, PassportError> {
    let object = value.and_then(Value::as_object).ok_or_else(|| {
        PassportError::InvalidOrig("orig must be a JSON object".to_string())
    })?;
    if object.len() != 1 {
        return Err(PassportError::InvalidOrig(
            "orig must hold exactly one of tn or uri".to_string(),
        ));
    }
    let (key, inner) = object
        .iter()
        .next()
        .ok_or_else(|| PassportError::InvalidOrig("orig is empty".to_string()))?;
    let text = inner.as_str().ok_or_else(|| {
        PassportError::InvalidOrig(format!("orig {key} must be a string"))
    })?;
    if text.is_empty() {
        return Err(PassportError::InvalidOrig(format!(
            "orig {key} must be non-empty"
        )));
    }
    match key.as_str() {
        "tn" => Ok(Orig::Tn(text.to_string())),
        "uri" => Ok(Orig::Uri(text.to_string())),
        other => Err(PassportError::InvalidOrig(format!(
            "unexpected orig key {other}"
        ))),
    }
}

pub fn parse_dest(value: Option<&Value>) -> Result<Dest, PassportError> {
    let object = value.and_then(Value::as_object).ok_or_else(|| {
        PassportError::InvalidDest("dest must be a JSON object".to_string())
    })?;
    if object.len() != 1 {
        return Err(PassportError::InvalidDest(
            "dest must hold exactly one of tn or uri".to_string(),
        ));
    }
    let (key, inner) = object
        .iter()
        .next()
        .ok_or_else(|| PassportError::InvalidDest("dest is empty".to_string()))?;
    let list = inner.as_array().ok_or_else(|| {
        PassportError::InvalidDest(format!("dest {key} must be a list"))
    })?;
    if list.is_empty() {
        return Err(PassportError::InvalidDest(format!(
            "dest {key} must be non-empty"
        )));
    }
    let mut entries = Vec::with_capacity(list.len());
    for element in list {
        let text = element.as_str().ok_or_else(|| {
            PassportError::InvalidDest(format!("dest {key} entries must be strings"))
        })?;
        if text.is_empty() {
            return Err(PassportError::InvalidDest(format!(
                "dest {key} entries must be non-empty"
            )));
        }
        entries.push(text.to_string());
    }
    match key.as_str() {
        "tn" => Ok(Dest::Tn(entries)),
        "uri" => Ok(Dest::Uri(entries)),
        other => Err(PassportError::InvalidDest(format!(
            "unexpected dest key {other}"
        ))),
    }
}

pub fn parse_iat(value: &Value) -> Result<i64, PassportError> {
    let iat = value.as_i64().ok_or_else(|| {
        PassportError::InvalidIat("iat must be an integer".to_string())
    })?;
    if iat < 0 {
        return Err(PassportError::InvalidIat(
            "iat must be non-negative".to_string(),
        ));
    }
    Ok(iat)
}

fn parse_origid(value: &Value) -> Result<String, PassportError> {
    let text = value.as_str().ok_or_else(|| {
        PassportError::InvalidOrigid("origid must be a string".to_string())
    })?;
    Uuid::parse_str(text)
        .map_err(|_| PassportError::InvalidOrigid(format!("{text} is not a UUID")))?;
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_577_836_800;

    fn signing_request(value: Value) -> Map<String, Value> {
        value.as_object().expect("object").clone()
    }

    fn full_claims() -> Map<String, Value> {
        signing_request(json!({
            "attest": "A",
            "dest": {"tn": ["12155551213"]},
            "iat": NOW,
            "orig": {"tn": "12155551212"},
            "origid": "123e4567-e89b-12d3-a456-426614174000",
        }))
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let claims = validate_signing(&full_claims(), NOW).expect("valid claims");
        let canonical = claims.canonical_json().expect("canonical json");
        assert_eq!(
            canonical,
            "{\"attest\":\"A\",\"dest\":{\"tn\":[\"12155551213\"]},\"iat\":1577836800,\
             \"orig\":{\"tn\":\"12155551212\"},\"origid\":\"123e4567-e89b-12d3-a456-426614174000\"}"
        );
    }

    #[test]
    fn canonical_json_is_input_order_independent() {
        // Same claims presented in reverse key order.
        let shuffled = signing_request(json!({
            "origid": "123e4567-e89b-12d3-a456-426614174000",
            "orig": {"tn": "12155551212"},
            "iat": NOW,
            "dest": {"tn": ["12155551213"]},
            "attest": "A",
        }));
        let a = validate_signing(&full_claims(), NOW).expect("valid");
        let b = validate_signing(&shuffled, NOW).expect("valid");
        assert_eq!(
            a.canonical_json().expect("json"),
            b.canonical_json().expect("json")
        );
        assert_eq!(
            a.fingerprint().expect("fingerprint"),
            b.fingerprint().expect("fingerprint")
        );
    }

    #[test]
    fn signing_fills_missing_iat_and_origid() {
        let request = signing_request(json!({
            "attest": "B",
            "dest": {"uri": ["sip:alice@example.com"]},
            "orig": {"uri": "sip:bob@example.com"},
        }));
        let claims = validate_signing(&request, NOW).expect("valid");
        assert_eq!(claims.iat, NOW);
        assert!(Uuid::parse_str(&claims.origid).is_ok());
    }

    #[test]
    fn rejects_unexpected_claim() {
        let mut request = full_claims();
        request.insert("extra".to_string(), json!(1));
        let err = validate_signing(&request, NOW).expect_err("unexpected claim");
        assert!(matches!(err, PassportError::UnexpectedClaims(_)));
    }

    #[test]
    fn rejects_missing_required_claim() {
        let mut request = full_claims();
        request.remove("dest");
        let err = validate_signing(&request, NOW).expect_err("missing dest");
        assert!(matches!(err, PassportError::UnexpectedClaims(_)));
    }

    #[test]
    fn rejects_invalid_attest() {
        let mut request = full_claims();
        request.insert("attest".to_string(), json!("D"));
        let err = validate_signing(&request, NOW).expect_err("attest D");
        assert!(matches!(err, PassportError::InvalidAttest(_)));
    }

    #[test]
    fn rejects_orig_with_both_keys() {
        let mut request = full_claims();
        request.insert(
            "orig".to_string(),
            json!({"tn": "12155551212", "uri": "sip:x@y"}),
        );
        let err = validate_signing(&request, NOW).expect_err("two orig keys");
        assert!(matches!(err, PassportError::InvalidOrig(_)));
    }

    #[test]
    fn rejects_empty_orig_value() {
        let mut request = full_claims();
        request.insert("orig".to_string(), json!({"tn": ""}));
        let err = validate_signing(&request, NOW).expect_err("empty orig");
        assert!(matches!(err, PassportError::InvalidOrig(_)));
    }

    #[test]
    fn rejects_empty_dest_list() {
        let mut request = full_claims();
        request.insert("dest".to_string(), json!({"tn": []}));
        let err = validate_signing(&request, NOW).expect_err("empty dest");
        assert!(matches!(err, PassportError::InvalidDest(_)));
    }

    #[test]
    fn rejects_dest_with_unknown_key() {
        let mut request = full_claims();
        request.insert("dest".to_string(), json!({"email": ["a@b"]}));
        let err = validate_signing(&request, NOW).expect_err("unknown dest key");
        assert!(matches!(err, PassportError::InvalidDest(_)));
    }

    #[test]
    fn rejects_negative_and_fractional_iat() {
        let mut request = full_claims();
        request.insert("iat".to_string(), json!(-1));
        assert!(matches!(
            validate_signing(&request, NOW),
            Err(PassportError::InvalidIat(_))
        ));
        request.insert("iat".to_string(), json!(1.5));
        assert!(matches!(
            validate_signing(&request, NOW),
            Err(PassportError::InvalidIat(_))
        ));
    }

    #[test]
    fn rejects_malformed_origid() {
        let mut request = full_claims();
        request.insert("origid".to_string(), json!("not-a-uuid"));
        let err = validate_signing(&request, NOW).expect_err("bad origid");
        assert!(matches!(err, PassportError::InvalidOrigid(_)));
    }

    #[test]
    fn verification_requires_all_claims() {
        let mut payload = full_claims();
        payload.remove("origid");
        let err = validate_verification(&payload, NOW, DEFAULT_FRESHNESS_WINDOW_SECONDS)
            .expect_err("missing origid");
        assert!(matches!(err, PassportError::UnexpectedClaims(_)));
    }

    #[test]
    fn verification_enforces_freshness_window() {
        let payload = full_claims();
        let err = validate_verification(&payload, NOW + 120, DEFAULT_FRESHNESS_WINDOW_SECONDS)
            .expect_err("stale iat");
        assert!(matches!(err, PassportError::StaleIat { .. }));

        // The window is symmetric: future-dated iat is equally stale.
        let err = validate_verification(&payload, NOW - 120, DEFAULT_FRESHNESS_WINDOW_SECONDS)
            .expect_err("future iat");
        assert!(matches!(err, PassportError::StaleIat { .. }));

        validate_verification(&payload, NOW + 60, DEFAULT_FRESHNESS_WINDOW_SECONDS)
            .expect("boundary iat accepted");
    }

    #[test]
    fn first_failure_wins_over_later_rules() {
        // Both attest and origid are invalid; attest is checked first.
        let mut request = full_claims();
        request.insert("attest".to_string(), json!("Z"));
        request.insert("origid".to_string(), json!("not-a-uuid"));
        let err = validate_signing(&request, NOW).expect_err("attest first");
        assert!(matches!(err, PassportError::InvalidAttest(_)));
    }
}
