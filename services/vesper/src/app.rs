//! HTTP application wiring and service bootstrap.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers. `bootstrap` performs the
//! startup ladder: each store that cannot come up names itself so the
//! entry point can exit with a distinct code.
use crate::api;
use crate::config::VesperConfig;
use crate::credentials::SigningCredentialsStore;
use crate::keyservice::{EksCredentialsStore, KeyServiceClient};
use crate::pubkeys::PublicKeyCache;
use crate::replay::ReplayAttackCache;
use crate::rootcerts::RootCertsStore;
use crate::sticr::SticrHostStore;
use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// Connect+request timeout for KeyService and x5u fetches.
const HTTP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<VesperConfig>,
    pub eks: Arc<EksCredentialsStore>,
    pub sticr: Arc<SticrHostStore>,
    pub keyservice: Arc<KeyServiceClient>,
    pub signing: Arc<SigningCredentialsStore>,
    pub roots: Arc<RootCertsStore>,
    pub pubkeys: Arc<PublicKeyCache>,
    pub replay: Arc<ReplayAttackCache>,
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("eks credentials: {0}")]
    EksCredentials(String),
    #[error("sticr host: {0}")]
    SticrHost(String),
    #[error("signing credentials: {0}")]
    SigningCredentials(String),
    #[error("root certs: {0}")]
    RootCerts(String),
}

impl InitError {
    pub fn exit_code(&self) -> u8 {
        match self {
            InitError::EksCredentials(_) => 1,
            InitError::SticrHost(_) => 2,
            InitError::SigningCredentials(_) => 3,
            InitError::RootCerts(_) => 4,
        }
    }
}

/// Builds the shared service context, fetching initial signing credentials
/// and root certificates from the KeyService.
pub async fn bootstrap(config: VesperConfig) -> Result<AppState, InitError> {
    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|err| InitError::EksCredentials(format!("build http client: {err}")))?;

    let eks = Arc::new(
        EksCredentialsStore::from_file(&config.eks_credentials_file)
            .map_err(|err| InitError::EksCredentials(format!("{err:#}")))?,
    );
    let sticr = SticrHostStore::from_file(&config.sticr_host_file)
        .map_err(|err| InitError::SticrHost(format!("{err:#}")))?;
    let keyservice = Arc::new(KeyServiceClient::new(http.clone(), eks.clone()));
    let signing = SigningCredentialsStore::bootstrap(&keyservice)
        .await
        .map_err(|err| InitError::SigningCredentials(format!("{err:#}")))?;
    let roots = RootCertsStore::bootstrap(&keyservice)
        .await
        .map_err(|err| InitError::RootCerts(format!("{err:#}")))?;

    Ok(AppState {
        config: Arc::new(config),
        eks,
        sticr: Arc::new(sticr),
        keyservice,
        signing: Arc::new(signing),
        roots: Arc::new(roots),
        pubkeys: Arc::new(PublicKeyCache::new(http)),
        replay: Arc::new(ReplayAttackCache::new()),
    })
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(Any);

    Router::new()
        .route("/v1/version", get(api::version::version))
        .route("/stir/v1/signing", post(api::signing::sign_request))
        .route(
            "/stir/v1/verification",
            post(api::verification::verify_request),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
