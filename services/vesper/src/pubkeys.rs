//! Content-addressed public-key cache.
//!
//! Maps an x5u URL to the parsed leaf certificate, intermediate chain, and
//! ECDSA public key served at that URL. Entries are fetched lazily with
//! concurrent misses coalesced (at most one outbound fetch per URL in
//! flight) and live until the next periodic bulk flush; there is no
//! per-entry TTL. Chain validation against the current root pool happens on
//! every verification, so cached material cannot outlive a root swap.
use anyhow::{Context, Result, bail};
use dashmap::DashMap;
use p256::ecdsa::VerifyingKey;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use vesper_passport::crypto;
use x509_cert::Certificate;

#[derive(Debug)]
pub struct CachedPublicKey {
    pub leaf: Certificate,
    pub intermediates: Vec<Certificate>,
    pub key: VerifyingKey,
    pub fetched_at: Instant,
}

#[derive(Debug)]
pub struct PublicKeyCache {
    http: reqwest::Client,
    entries: DashMap<String, Arc<OnceCell<Arc<CachedPublicKey>>>>,
}

impl PublicKeyCache {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            entries: DashMap::new(),
        }
    }

    /// Returns the cached entry for `x5u`, fetching it on a miss. A failed
    /// fetch leaves the cell empty, so the next caller retries.
    pub async fn resolve(&self, x5u: &str) -> Result<Arc<CachedPublicKey>> {
        let cell = self.entries.entry(x5u.to_string()).or_default().clone();
        let entry = cell.get_or_try_init(|| self.fetch(x5u)).await?;
        Ok(entry.clone())
    }

    async fn fetch(&self, x5u: &str) -> Result<Arc<CachedPublicKey>> {
        let response = self
            .http
            .get(x5u)
            .send()
            .await
            .with_context(|| format!("GET {x5u}"))?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            bail!("GET {x5u} returned status {status}");
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("read GET {x5u} body"))?;
        let mut certs = crypto::parse_pem_chain(&body)
            .with_context(|| format!("parse certificate chain from {x5u}"))?;
        let leaf = certs.remove(0);
        let key = crypto::cert_verifying_key(&leaf)
            .context("extract public key from leaf certificate")?;
        Ok(Arc::new(CachedPublicKey {
            leaf,
            intermediates: certs,
            key,
            fetched_at: Instant::now(),
        }))
    }

    /// Installs an entry without fetching. Test seam, mirroring how the
    /// refresh path would warm the cache.
    pub fn seed(&self, x5u: impl Into<String>, entry: CachedPublicKey) {
        let cell = OnceCell::new_with(Some(Arc::new(entry)));
        self.entries.insert(x5u.into(), Arc::new(cell));
    }

    /// Clears the entire cache.
    pub fn flush(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
