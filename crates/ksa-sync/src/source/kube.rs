//! Kubernetes API secret source
//!
//! Lists `v1/Secret` objects by label selector over the REST API using the
//! pod's service account. The token file is re-read on every fetch so
//! rotated bound tokens are picked up without a restart.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use ksa_core::config::SyncConfig;
use ksa_core::{CredentialRecord, SourceError};

use super::SecretSource;

/// Longest response body excerpt kept in error messages
const ERROR_BODY_LIMIT: usize = 256;

#[derive(Debug, Deserialize)]
struct SecretList {
    #[serde(default)]
    items: Vec<Secret>,
}

#[derive(Debug, Deserialize)]
struct Secret {
    metadata: ObjectMeta,
    #[serde(default)]
    data: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
}

impl From<Secret> for CredentialRecord {
    fn from(secret: Secret) -> Self {
        CredentialRecord {
            namespace: secret.metadata.namespace,
            name: secret.metadata.name,
            data: secret.data.unwrap_or_default(),
        }
    }
}

/// Secret source backed by the Kubernetes API server
#[derive(Debug, Clone)]
pub struct KubeSecretSource {
    client: reqwest::Client,
    base_url: String,
    token_path: Option<PathBuf>,
    label_selector: String,
    namespace: Option<String>,
}

impl KubeSecretSource {
    /// Build a source from the sync configuration.
    ///
    /// The API server comes from `api_server` or, inside a pod, from
    /// `KUBERNETES_SERVICE_HOST`/`KUBERNETES_SERVICE_PORT`. The cluster CA at
    /// `ca_path` is trusted when present.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SourceError> {
        let base_url = match &config.api_server {
            Some(url) => url.clone(),
            None => in_cluster_url()?,
        };

        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.fetch_timeout)
            .timeout(config.fetch_timeout);

        if base_url.starts_with("https://") {
            match std::fs::read(&config.ca_path) {
                Ok(pem) => {
                    let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                        SourceError::Credentials(format!(
                            "invalid CA bundle {:?}: {}",
                            config.ca_path, e
                        ))
                    })?;
                    builder = builder.add_root_certificate(cert);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(
                        "Cluster CA {:?} not found, relying on system roots",
                        config.ca_path
                    );
                }
                Err(e) => {
                    return Err(SourceError::Credentials(format!(
                        "failed to read CA bundle {:?}: {}",
                        config.ca_path, e
                    )))
                }
            }
        }

        let client = builder
            .build()
            .map_err(|e| SourceError::Credentials(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token_path: Some(config.token_path.clone()),
            label_selector: config.label_selector.clone(),
            namespace: config.namespace.clone(),
        })
    }

    /// Build a source against `base_url` with a plain client and no token
    pub fn new(
        base_url: impl Into<String>,
        label_selector: impl Into<String>,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Credentials(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token_path: None,
            label_selector: label_selector.into(),
            namespace,
        })
    }

    /// Use the bearer token stored at `path`
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    /// Collection URL for the configured scope
    pub fn list_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.namespace {
            Some(ns) => format!("{}/api/v1/namespaces/{}/secrets", base, ns),
            None => format!("{}/api/v1/secrets", base),
        }
    }

    async fn bearer_token(&self) -> Result<Option<String>, SourceError> {
        let Some(path) = &self.token_path else {
            return Ok(None);
        };

        match tokio::fs::read_to_string(path).await {
            Ok(token) => Ok(Some(token.trim().to_string())),
            // Out-of-cluster API servers may not need a token
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No service account token at {:?}", path);
                Ok(None)
            }
            Err(e) => Err(SourceError::Credentials(format!(
                "failed to read token {:?}: {}",
                path, e
            ))),
        }
    }
}

#[async_trait]
impl SecretSource for KubeSecretSource {
    async fn fetch(&self) -> Result<Vec<CredentialRecord>, SourceError> {
        let url = self.list_url();
        let mut request = self
            .client
            .get(&url)
            .query(&[("labelSelector", self.label_selector.as_str())]);

        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token);
        }

        tracing::debug!("Listing secrets from {} ({})", url, self.label_selector);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Unavailable(format!("request to {} timed out", url))
            } else {
                SourceError::Unavailable(format!("request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(SourceError::Unavailable(format!(
                "API server returned {}: {}",
                status, excerpt
            )));
        }

        let list: SecretList = response
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(format!("invalid secret list: {}", e)))?;

        Ok(list.items.into_iter().map(CredentialRecord::from).collect())
    }
}

/// API server URL from the in-cluster service environment
fn in_cluster_url() -> Result<String, SourceError> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
        SourceError::Credentials(
            "KUBERNETES_SERVICE_HOST is not set and no api_server is configured".into(),
        )
    })?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    Ok(api_url(&host, &port))
}

fn api_url(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("https://[{}]:{}", host, port)
    } else {
        format!("https://{}:{}", host, port)
    }
}
