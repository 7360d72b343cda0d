use thiserror::Error;

#[derive(Debug, Error)]
pub enum PassportError {
    #[error("invalid claim set: {0}")]
    UnexpectedClaims(String),
    #[error("invalid attest: {0}")]
    InvalidAttest(String),
    #[error("invalid orig: {0}")]
    InvalidOrig(String),
    #[error("invalid dest: {0}")]
    InvalidDest(String),
    #[error("invalid iat: {0}")]
    InvalidIat(String),
    #[error("iat {iat} outside freshness window at {now}")]
    StaleIat { iat: i64, now: i64 },
    #[error("invalid origid: {0}")]
    InvalidOrigid(String),
    #[error("invalid identity header: {0}")]
    InvalidIdentityHeader(String),
    #[error("invalid base64url segment")]
    InvalidBase64,
    #[error("invalid passport header: {0}")]
    InvalidPassportHeader(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("signature verification failed")]
    SignatureMismatch,
    #[error("signing failed")]
    SigningFailure,
    #[error("certificate parse failure: {0}")]
    InvalidCertificate(String),
    #[error("certificate chain validation failed: {0}")]
    ChainValidation(String),
}

pub type PassportResult<T> = Result<T, PassportError>;
