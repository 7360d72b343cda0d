use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

// Service configuration, loaded once at startup from the JSON file named by
// the single command-line argument. Read-only after init.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VesperConfig {
    // Host identity used in log lines.
    pub host: String,
    // HTTP bind address parts.
    pub http_host: String,
    pub http_port: String,
    // TLS material for the fronting listener; verified to exist when set.
    pub ssl_cert_file: String,
    pub ssl_key_file: String,
    // KeyService access: file holding {"url", "token"}, re-read periodically.
    pub eks_credentials_file: String,
    pub eks_credentials_refresh_interval: u64, // minutes
    // STI-CR host prefix: file holding {"sticrHost"}, re-read periodically.
    pub sticr_host_file: String,
    pub sticr_file_check_interval: u64, // minutes
    pub root_certs_fetch_interval: u64, // seconds
    pub signing_credentials_fetch_interval: u64, // seconds
    pub replay_attack_cache_validation_interval: u64, // seconds
    pub public_keys_cache_flush_interval: u64, // seconds
    pub freshness_window_seconds: i64,
}

impl Default for VesperConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            http_host: "127.0.0.1".to_string(),
            http_port: "80".to_string(),
            ssl_cert_file: String::new(),
            ssl_key_file: String::new(),
            eks_credentials_file: String::new(),
            eks_credentials_refresh_interval: 60,
            sticr_host_file: String::new(),
            sticr_file_check_interval: 10,
            root_certs_fetch_interval: 60,
            signing_credentials_fetch_interval: 60,
            replay_attack_cache_validation_interval: 1,
            public_keys_cache_flush_interval: 300,
            freshness_window_seconds: 60,
        }
    }
}

impl VesperConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&contents).with_context(|| "parse config file json")?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.http_host, self.http_port)
            .parse()
            .with_context(|| "parse httpHost/httpPort into a socket address")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn from_file_parses_camel_case_keys() {
        let tmpdir = TempDir::new().unwrap();
        let config_path = tmpdir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{
                "host": "vesper-01",
                "httpHost": "0.0.0.0",
                "httpPort": "9000",
                "eksCredentialsFile": "/etc/vesper/eks.json",
                "eksCredentialsRefreshInterval": 30,
                "sticrHostFile": "/etc/vesper/sticr.json",
                "sticrFileCheckInterval": 5,
                "rootCertsFetchInterval": 120,
                "signingCredentialsFetchInterval": 90,
                "replayAttackCacheValidationInterval": 1,
                "publicKeysCacheFlushInterval": 600,
                "freshnessWindowSeconds": 30
            }"#,
        )
        .unwrap();

        let config = VesperConfig::from_file(&config_path).expect("from_file");
        assert_eq!(config.host, "vesper-01");
        assert_eq!(config.bind_addr().expect("addr").to_string(), "0.0.0.0:9000");
        assert_eq!(config.eks_credentials_refresh_interval, 30);
        assert_eq!(config.sticr_file_check_interval, 5);
        assert_eq!(config.root_certs_fetch_interval, 120);
        assert_eq!(config.freshness_window_seconds, 30);
    }

    #[test]
    fn missing_options_fall_back_to_defaults() {
        let tmpdir = TempDir::new().unwrap();
        let config_path = tmpdir.path().join("config.json");
        fs::write(&config_path, r#"{"httpPort": "8080"}"#).unwrap();

        let config = VesperConfig::from_file(&config_path).expect("from_file");
        assert_eq!(config.bind_addr().expect("addr").to_string(), "127.0.0.1:8080");
        assert_eq!(config.freshness_window_seconds, 60);
        assert_eq!(config.replay_attack_cache_validation_interval, 1);
        assert!(config.ssl_cert_file.is_empty());
    }

    #[test]
    fn unknown_options_are_ignored() {
        let tmpdir = TempDir::new().unwrap();
        let config_path = tmpdir.path().join("config.json");
        fs::write(&config_path, r#"{"logFile": "/var/log/vesper.log"}"#).unwrap();
        assert!(VesperConfig::from_file(&config_path).is_ok());
    }

    #[test]
    fn rejects_missing_file_and_invalid_json() {
        let tmpdir = TempDir::new().unwrap();
        assert!(VesperConfig::from_file(tmpdir.path().join("absent.json")).is_err());

        let config_path = tmpdir.path().join("bad.json");
        fs::write(&config_path, "not json").unwrap();
        assert!(VesperConfig::from_file(&config_path).is_err());
    }

    #[test]
    fn rejects_unparseable_bind_address() {
        let config = VesperConfig {
            http_host: "not a host".to_string(),
            ..VesperConfig::default()
        };
        assert!(config.bind_addr().is_err());
    }
}
