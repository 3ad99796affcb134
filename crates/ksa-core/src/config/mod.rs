//! Configuration management for kube-ssh-auth

mod auth;
mod exporter;
pub mod serde_utils;
mod sync;

pub use auth::AuthConfig;
pub use exporter::ExporterConfig;
pub use sync::{SyncConfig, SERVICE_ACCOUNT_DIR};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Layout of the shared configuration file.
///
/// Each binary reads its own section; missing sections take defaults.
///
/// ```toml
/// [sync]
/// namespace = "team-a"
///
/// [auth]
/// service_env_var = "K8S_SERVICE"
///
/// [exporter]
/// bind_address = "0.0.0.0:9100"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Sync daemon settings
    pub sync: SyncConfig,
    /// Login hook settings
    pub auth: AuthConfig,
    /// Session exporter settings
    pub exporter: ExporterConfig,
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    PathBuf::from("/etc/kube-ssh-auth")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration from `path`, or from the default location if present.
///
/// An explicit path must exist. Without one, a missing default file yields
/// `T::default()`.
pub fn load_or_default<T>(path: Option<&Path>) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match path {
        Some(path) => load_config(path),
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                load_config(&default_path)
            } else {
                tracing::debug!("No config at {:?}, using defaults", default_path);
                Ok(T::default())
            }
        }
    }
}
