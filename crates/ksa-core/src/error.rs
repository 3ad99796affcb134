//! Core error types for kube-ssh-auth

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the kube-ssh-auth crates
#[derive(Error, Debug)]
pub enum KsaError {
    /// Secret source error
    #[error("Secret source error: {0}")]
    Source(#[from] SourceError),

    /// Record decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Cache store error
    #[error("Cache error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures reaching the cluster secret source.
///
/// Every variant means the sync cycle is abandoned and the cache keeps its
/// previous contents.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The control-plane call could not complete
    #[error("Secret source unavailable: {0}")]
    Unavailable(String),

    /// The control-plane call did not finish within the fetch timeout
    #[error("Secret source timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The in-cluster identity could not be loaded
    #[error("Cluster credentials unavailable: {0}")]
    Credentials(String),
}

/// Reasons a single credential record is skipped during a sync cycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A required field is absent
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field is not valid base64
    #[error("field `{0}` is not valid base64")]
    InvalidBase64(&'static str),

    /// A field decoded to bytes that are not UTF-8
    #[error("field `{0}` is not valid UTF-8")]
    InvalidUtf8(&'static str),
}

/// Local cache store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be opened or read
    #[error("Cache unavailable at {path:?}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted cache exists but cannot be parsed
    #[error("Cache at {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The persisted cache was written by an incompatible version
    #[error("Cache at {path:?} has unsupported format version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },

    /// A replacement mapping could not be committed
    #[error("Failed to commit cache at {path:?}: {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The commit task died before finishing
    #[error("Cache commit aborted: {0}")]
    Aborted(String),

    /// The in-memory store lock was poisoned by a panicking writer
    #[error("Cache lock poisoned")]
    Poisoned,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
