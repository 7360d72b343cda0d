//! KeyService access: bearer credentials and upstream fetches.
//!
//! # Purpose
//! The KeyService (EKS) holds the server's signing key and the trusted
//! root-certificate bundle. Requests carry the bearer token in an
//! `X-Vault-Token` header; any deviation from the expected response shape
//! is an error and produces no partial update downstream.
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EksCredentials {
    pub url: String,
    pub token: String,
}

/// Bearer credentials for the KeyService, re-read from file at runtime.
#[derive(Debug)]
pub struct EksCredentialsStore {
    path: PathBuf,
    inner: RwLock<Arc<EksCredentials>>,
}

impl EksCredentialsStore {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let credentials = read_credentials(&path)?;
        Ok(Self {
            path,
            inner: RwLock::new(Arc::new(credentials)),
        })
    }

    pub fn with_credentials(credentials: EksCredentials) -> Self {
        Self {
            path: PathBuf::new(),
            inner: RwLock::new(Arc::new(credentials)),
        }
    }

    pub fn snapshot(&self) -> Arc<EksCredentials> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-reads the credentials file. The previous value stays in place on
    /// any error.
    pub fn refresh(&self) -> Result<()> {
        let credentials = read_credentials(&self.path)?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if **guard != credentials {
            tracing::info!(url = %credentials.url, "eks credentials updated");
            *guard = Arc::new(credentials);
        }
        Ok(())
    }
}

fn read_credentials(path: &Path) -> Result<EksCredentials> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read eks credentials file {}", path.display()))?;
    let credentials: EksCredentials =
        serde_json::from_str(&contents).with_context(|| "parse eks credentials json")?;
    if credentials.url.is_empty() || credentials.token.is_empty() {
        bail!("eks credentials must carry a url and a token");
    }
    Ok(credentials)
}

/// HTTP client for the two KeyService endpoints.
#[derive(Debug)]
pub struct KeyServiceClient {
    http: reqwest::Client,
    credentials: Arc<EksCredentialsStore>,
}

impl KeyServiceClient {
    pub fn new(http: reqwest::Client, credentials: Arc<EksCredentialsStore>) -> Self {
        Self { http, credentials }
    }

    /// `GET <base>/whitelist` -> the PEM bundle of trusted root certs.
    pub async fn fetch_root_certs(&self) -> Result<String> {
        let data = self.fetch_data("whitelist").await?;
        let pem = data
            .get("rootcerts")
            .and_then(Value::as_str)
            .context("\"rootcerts\" field must be a string")?;
        if pem.is_empty() {
            bail!("\"rootcerts\" field is empty");
        }
        Ok(pem.to_string())
    }

    /// `GET <base>/signing` -> the current x5u URL and private-key PEM.
    pub async fn fetch_signing_credentials(&self) -> Result<(String, String)> {
        let data = self.fetch_data("signing").await?;
        let x5u = data
            .get("x5u")
            .and_then(Value::as_str)
            .context("\"x5u\" field must be a string")?;
        let private_key = data
            .get("privatekey")
            .and_then(Value::as_str)
            .context("\"privatekey\" field must be a string")?;
        if x5u.is_empty() || private_key.is_empty() {
            bail!("signing credentials fields must be non-empty");
        }
        Ok((x5u.to_string(), private_key.to_string()))
    }

    async fn fetch_data(&self, endpoint: &str) -> Result<Map<String, Value>> {
        let credentials = self.credentials.snapshot();
        let url = format!("{}/{}", credentials.url.trim_end_matches('/'), endpoint);
        let response = self
            .http
            .get(&url)
            .header("X-Vault-Token", &credentials.token)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            bail!("GET {url} returned status {status}");
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.contains("application/json") {
            bail!("GET {url} returned content type {content_type:?}, expected application/json");
        }
        let body: Value = response
            .json()
            .await
            .with_context(|| format!("decode GET {url} response body"))?;
        match body.get("data") {
            Some(Value::Object(data)) => Ok(data.clone()),
            Some(_) => bail!("\"data\" field must be an object"),
            None => bail!("\"data\" field missing in KeyService response"),
        }
    }
}
