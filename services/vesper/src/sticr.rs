//! STI-CR host resolver.
//!
//! Tracks the authoritative x5u URL prefix from a file that may change at
//! runtime. Every x5u presented on the verification path must start with
//! this prefix before any outbound fetch happens.
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SticrHostFile {
    sticr_host: String,
}

#[derive(Debug)]
pub struct SticrHostStore {
    path: PathBuf,
    inner: RwLock<Arc<String>>,
}

impl SticrHostStore {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let host = read_host(&path)?;
        Ok(Self {
            path,
            inner: RwLock::new(Arc::new(host)),
        })
    }

    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            path: PathBuf::new(),
            inner: RwLock::new(Arc::new(host.into())),
        }
    }

    pub fn snapshot(&self) -> Arc<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-reads the host file; the previous prefix stays on any error.
    pub fn refresh(&self) -> Result<()> {
        let host = read_host(&self.path)?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if **guard != host {
            tracing::info!(host = %host, "sticr host updated");
            *guard = Arc::new(host);
        }
        Ok(())
    }
}

fn read_host(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read sticr host file {}", path.display()))?;
    let file: SticrHostFile =
        serde_json::from_str(&contents).with_context(|| "parse sticr host json")?;
    if file.sticr_host.is_empty() {
        bail!("\"sticrHost\" must be non-empty");
    }
    Ok(file.sticr_host)
}
