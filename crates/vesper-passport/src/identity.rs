//! SIP Identity header (RFC 8224) assembly and parsing.
//!
//! Wire format:
//! `b64url(hdr).b64url(payload).b64url(sig);info=<x5u>;alg=ES256;ppt=shaken`
//! The three trailing parameters may appear in any order; anything else is
//! rejected.
use crate::errors::PassportError;
use crate::jws::CompactJws;
use regex::Regex;
use std::sync::OnceLock;

fn info_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^info=<..*>$").expect("info parameter regex"))
}

fn alg_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^alg=ES256$").expect("alg parameter regex"))
}

fn ppt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^ppt=shaken$").expect("ppt parameter regex"))
}

/// Assembles the full Identity header value from a compact JWS and the
/// certificate URL.
pub fn assemble(jws: &str, x5u: &str) -> String {
    format!("{jws};info=<{x5u}>;alg=ES256;ppt=shaken")
}

#[derive(Debug, Clone)]
pub struct IdentityHeader {
    pub jws: CompactJws,
    pub info_url: String,
}

pub fn parse(header: &str) -> Result<IdentityHeader, PassportError> {
    let mut tokens = header.split(';').map(str::trim);
    let token = tokens.next().unwrap_or_default();
    if token.is_empty() {
        return Err(PassportError::InvalidIdentityHeader(
            "missing JWS token".to_string(),
        ));
    }
    if token.matches('.').count() != 2 {
        return Err(PassportError::InvalidIdentityHeader(
            "JWS token must contain exactly two dots".to_string(),
        ));
    }
    let jws = CompactJws::parse(token)?;

    let mut info_url: Option<String> = None;
    let mut saw_alg = false;
    let mut saw_ppt = false;
    for param in tokens {
        if info_regex().is_match(param) {
            if info_url.is_some() {
                return Err(PassportError::InvalidIdentityHeader(
                    "duplicate info parameter".to_string(),
                ));
            }
            info_url = Some(param["info=<".len()..param.len() - 1].to_string());
        } else if alg_regex().is_match(param) {
            if saw_alg {
                return Err(PassportError::InvalidIdentityHeader(
                    "duplicate alg parameter".to_string(),
                ));
            }
            saw_alg = true;
        } else if ppt_regex().is_match(param) {
            if saw_ppt {
                return Err(PassportError::InvalidIdentityHeader(
                    "duplicate ppt parameter".to_string(),
                ));
            }
            saw_ppt = true;
        } else {
            return Err(PassportError::InvalidIdentityHeader(format!(
                "unrecognized parameter {param}"
            )));
        }
    }
    let info_url = info_url.ok_or_else(|| {
        PassportError::InvalidIdentityHeader("missing info parameter".to_string())
    })?;
    if !saw_alg {
        return Err(PassportError::InvalidIdentityHeader(
            "missing alg parameter".to_string(),
        ));
    }
    if !saw_ppt {
        return Err(PassportError::InvalidIdentityHeader(
            "missing ppt parameter".to_string(),
        ));
    }
    Ok(IdentityHeader { jws, info_url })
}

#[cfg(test)]
mod tests {
    use super::*;

    const X5U: &str = "https://cr.example.com/shaken/cert.pem";

    #[test]
    fn assemble_and_parse_round_trip() {
        let header = assemble("aaa.bbb.ccc", X5U);
        assert_eq!(header, format!("aaa.bbb.ccc;info=<{X5U}>;alg=ES256;ppt=shaken"));
        let parsed = parse(&header).expect("parse");
        assert_eq!(parsed.info_url, X5U);
        assert_eq!(parsed.jws.signing_input(), "aaa.bbb");
    }

    #[test]
    fn parameters_may_be_reordered() {
        let header = format!("aaa.bbb.ccc;ppt=shaken;info=<{X5U}>;alg=ES256");
        let parsed = parse(&header).expect("parse reordered");
        assert_eq!(parsed.info_url, X5U);
    }

    #[test]
    fn whitespace_around_parameters_is_trimmed() {
        let header = format!("aaa.bbb.ccc; info=<{X5U}> ;alg=ES256; ppt=shaken");
        assert!(parse(&header).is_ok());
    }

    #[test]
    fn rejects_missing_parameters() {
        for header in [
            "aaa.bbb.ccc;alg=ES256;ppt=shaken".to_string(),
            format!("aaa.bbb.ccc;info=<{X5U}>;ppt=shaken"),
            format!("aaa.bbb.ccc;info=<{X5U}>;alg=ES256"),
        ] {
            assert!(parse(&header).is_err(), "header {header:?} should fail");
        }
    }

    #[test]
    fn rejects_unknown_and_duplicate_parameters() {
        let unknown = format!("aaa.bbb.ccc;info=<{X5U}>;alg=ES256;ppt=shaken;extra=1");
        assert!(parse(&unknown).is_err());
        let duplicate = format!("aaa.bbb.ccc;info=<{X5U}>;info=<{X5U}>;alg=ES256;ppt=shaken");
        assert!(parse(&duplicate).is_err());
    }

    #[test]
    fn rejects_wrong_alg_or_ppt_values() {
        let wrong_alg = format!("aaa.bbb.ccc;info=<{X5U}>;alg=RS256;ppt=shaken");
        assert!(parse(&wrong_alg).is_err());
        let wrong_ppt = format!("aaa.bbb.ccc;info=<{X5U}>;alg=ES256;ppt=div");
        assert!(parse(&wrong_ppt).is_err());
    }

    #[test]
    fn rejects_malformed_jws_token() {
        let two_segments = format!("aaa.bbb;info=<{X5U}>;alg=ES256;ppt=shaken");
        assert!(parse(&two_segments).is_err());
        let empty = format!(";info=<{X5U}>;alg=ES256;ppt=shaken");
        assert!(parse(&empty).is_err());
    }

    #[test]
    fn rejects_empty_info_url() {
        // The regex requires at least one character between the brackets.
        let header = "aaa.bbb.ccc;info=<>;alg=ES256;ppt=shaken";
        assert!(parse(header).is_err());
    }
}
