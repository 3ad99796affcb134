//! Sync daemon configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;
use crate::store::default_cache_path;

/// Where the pod's service account token and cluster CA are mounted
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Configuration for the credential sync daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Label selector identifying credential secrets
    pub label_selector: String,

    /// Restrict the sync to one namespace (all namespaces when unset)
    pub namespace: Option<String>,

    /// Time between sync cycles
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Upper bound on a single fetch from the API server
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,

    /// Cache file shared with the login hook
    pub cache_path: PathBuf,

    /// API server base URL. Derived from `KUBERNETES_SERVICE_HOST` and
    /// `KUBERNETES_SERVICE_PORT` when unset.
    pub api_server: Option<String>,

    /// Bearer token file for the API server
    pub token_path: PathBuf,

    /// PEM bundle used to verify the API server
    pub ca_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let sa_dir = PathBuf::from(SERVICE_ACCOUNT_DIR);

        Self {
            label_selector: "ssh=users".to_string(),
            namespace: None,
            interval: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(10),
            cache_path: default_cache_path(),
            api_server: None,
            token_path: sa_dir.join("token"),
            ca_path: sa_dir.join("ca.crt"),
        }
    }
}

impl SyncConfig {
    /// Reject settings the sync loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.label_selector.trim().is_empty() {
            return Err(ConfigError::Invalid("label_selector must not be empty".into()));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid("interval must be at least 1 second".into()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "fetch_timeout must be at least 1 second".into(),
            ));
        }
        if let Some(ns) = &self.namespace {
            if !is_dns_label(ns) {
                return Err(ConfigError::Invalid(format!(
                    "namespace {:?} is not a valid DNS label",
                    ns
                )));
            }
        }
        Ok(())
    }
}

/// RFC 1123 label: 1-63 lowercase alphanumerics or `-`, alphanumeric at both ends
fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    let edge_ok = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes.first().is_some_and(edge_ok)
        && bytes.last().is_some_and(edge_ok)
        && bytes.iter().all(|b| edge_ok(b) || *b == b'-')
}
