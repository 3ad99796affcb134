//! Session exporter configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Configuration for the session-count exporter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Authentication log to scan
    pub log_path: PathBuf,

    /// Address the metrics endpoint listens on
    pub bind_address: String,

    /// Time between log scans
    #[serde(with = "duration_secs")]
    pub interval: Duration,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("/var/log/auth.log"),
            bind_address: "0.0.0.0:8000".to_string(),
            interval: Duration::from_secs(10),
        }
    }
}

impl ExporterConfig {
    /// Reject settings the exporter cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid("interval must be at least 1 second".into()));
        }
        Ok(())
    }
}
