#![allow(dead_code)] // shared between test binaries that each use a subset

use axum::body::Body;
use axum::http::Request;
use p256::ecdsa::SigningKey;
use p256::pkcs8::DecodePrivateKey;
use rcgen::{
    BasicConstraints as CaConstraint, CertificateParams, IsCa, KeyPair, PKCS_ECDSA_P256_SHA256,
};
use std::sync::Arc;
use std::time::Instant;
use vesper::app::AppState;
use vesper::config::VesperConfig;
use vesper::credentials::{SigningCredentials, SigningCredentialsStore};
use vesper::keyservice::{EksCredentials, EksCredentialsStore, KeyServiceClient};
use vesper::pubkeys::{CachedPublicKey, PublicKeyCache};
use vesper::replay::ReplayAttackCache;
use vesper::rootcerts::RootCertsStore;
use vesper::sticr::SticrHostStore;
use vesper_passport::crypto;
use x509_cert::Certificate;
use x509_cert::der::Decode;

pub const STICR_HOST: &str = "https://cr.example.com";
pub const X5U: &str = "https://cr.example.com/shaken/cert.pem";

pub struct TestContext {
    pub state: AppState,
    pub signing_key: SigningKey,
    pub ca: Certificate,
}

/// Builds a full application state around a generated CA -> leaf chain,
/// with the leaf pre-seeded into the public-key cache under [`X5U`].
pub fn test_context() -> TestContext {
    let ca_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("ca key");
    let mut ca_params = CertificateParams::new(Vec::new()).expect("ca params");
    ca_params.is_ca = IsCa::Ca(CaConstraint::Unconstrained);
    let ca_cert = ca_params.self_signed(&ca_key).expect("ca cert");

    let leaf_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("leaf key");
    let leaf_params =
        CertificateParams::new(vec!["sp.example.com".to_string()]).expect("leaf params");
    let leaf_cert = leaf_params
        .signed_by(&leaf_key, &ca_cert, &ca_key)
        .expect("leaf cert");

    let ca = Certificate::from_der(ca_cert.der()).expect("ca der");
    let leaf = Certificate::from_der(leaf_cert.der()).expect("leaf der");
    let signing_key =
        SigningKey::from_pkcs8_der(&leaf_key.serialize_der()).expect("leaf private key");

    let http = reqwest::Client::new();
    let pubkeys = PublicKeyCache::new(http.clone());
    pubkeys.seed(
        X5U,
        CachedPublicKey {
            key: crypto::cert_verifying_key(&leaf).expect("leaf public key"),
            leaf,
            intermediates: Vec::new(),
            fetched_at: Instant::now(),
        },
    );

    let eks = Arc::new(EksCredentialsStore::with_credentials(EksCredentials {
        url: "http://127.0.0.1:1".to_string(),
        token: "test-token".to_string(),
    }));
    let keyservice = Arc::new(KeyServiceClient::new(http, eks.clone()));
    let state = AppState {
        config: Arc::new(VesperConfig::default()),
        eks,
        sticr: Arc::new(SticrHostStore::with_host(STICR_HOST)),
        keyservice,
        signing: Arc::new(SigningCredentialsStore::with_credentials(
            SigningCredentials {
                x5u: X5U.to_string(),
                key: signing_key.clone(),
            },
        )),
        roots: Arc::new(RootCertsStore::with_roots(vec![ca.clone()])),
        pubkeys: Arc::new(pubkeys),
        replay: Arc::new(ReplayAttackCache::new()),
    };

    TestContext {
        state,
        signing_key,
        ca,
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
