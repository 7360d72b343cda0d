//! Trusted root certificate store.
//!
//! Holds the X.509 pool every verification chains back to. The pool is
//! swapped atomically on refresh; a failed fetch leaves the previous pool
//! in place so verification keeps working against known-good anchors.
use crate::keyservice::KeyServiceClient;
use anyhow::{Context, Result};
use std::sync::{Arc, PoisonError, RwLock};
use vesper_passport::crypto;
use x509_cert::Certificate;

#[derive(Debug)]
pub struct RootCertsStore {
    inner: RwLock<Arc<Vec<Certificate>>>,
}

impl RootCertsStore {
    pub async fn bootstrap(client: &KeyServiceClient) -> Result<Self> {
        let certs = fetch(client).await?;
        Ok(Self {
            inner: RwLock::new(Arc::new(certs)),
        })
    }

    pub fn with_roots(certs: Vec<Certificate>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(certs)),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Certificate>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn refresh(&self, client: &KeyServiceClient) -> Result<()> {
        let certs = fetch(client).await?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(certs);
        Ok(())
    }
}

async fn fetch(client: &KeyServiceClient) -> Result<Vec<Certificate>> {
    let pem = client.fetch_root_certs().await?;
    crypto::parse_pem_chain(&pem).context("parse root certificate bundle")
}
