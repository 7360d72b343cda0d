//! Signing credentials store.
//!
//! Owns the current `(x5u, private key)` pair. Readers take an `Arc`
//! snapshot under a read lock held only for the pointer copy, so a refresh
//! can never expose a torn pair.
use crate::keyservice::KeyServiceClient;
use anyhow::{Context, Result};
use p256::ecdsa::SigningKey;
use std::sync::{Arc, PoisonError, RwLock};
use vesper_passport::crypto;

#[derive(Debug)]
pub struct SigningCredentials {
    pub x5u: String,
    pub key: SigningKey,
}

#[derive(Debug)]
pub struct SigningCredentialsStore {
    inner: RwLock<Arc<SigningCredentials>>,
}

impl SigningCredentialsStore {
    pub async fn bootstrap(client: &KeyServiceClient) -> Result<Self> {
        let credentials = fetch(client).await?;
        Ok(Self {
            inner: RwLock::new(Arc::new(credentials)),
        })
    }

    pub fn with_credentials(credentials: SigningCredentials) -> Self {
        Self {
            inner: RwLock::new(Arc::new(credentials)),
        }
    }

    pub fn snapshot(&self) -> Arc<SigningCredentials> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches fresh credentials and swaps them in; on any error the
    /// previous pair stays in place.
    pub async fn refresh(&self, client: &KeyServiceClient) -> Result<()> {
        let credentials = fetch(client).await?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(credentials);
        Ok(())
    }
}

async fn fetch(client: &KeyServiceClient) -> Result<SigningCredentials> {
    let (x5u, private_key_pem) = client.fetch_signing_credentials().await?;
    let key =
        crypto::signing_key_from_pem(&private_key_pem).context("parse signing private key")?;
    Ok(SigningCredentials { x5u, key })
}
