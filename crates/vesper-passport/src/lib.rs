//! PASSporT building blocks for SHAKEN call authentication.
//!
//! # Purpose
//! Everything needed to mint and check RFC 8225 identity tokens without
//! touching the network: claim validation with canonical JSON encoding,
//! the compact JWS codec, the SIP Identity header wire format, and ES256
//! signing/verification with X.509 trust-path validation.

pub mod claims;
pub mod crypto;
pub mod errors;
pub mod identity;
pub mod jws;

pub use claims::{Attest, Dest, Orig, PassportClaims};
pub use errors::{PassportError, PassportResult};
pub use jws::{CompactJws, PassportHeader};
