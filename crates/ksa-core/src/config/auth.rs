//! Login hook configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::store::default_cache_path;

/// Configuration for the login hook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Cache file written by the sync daemon
    pub cache_path: PathBuf,

    /// Session environment variable that receives the routing target
    pub service_env_var: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            service_env_var: "K8S_SERVICE".to_string(),
        }
    }
}
