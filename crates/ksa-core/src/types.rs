//! Core domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Suffix appended to a service name together with its namespace
pub const CLUSTER_DOMAIN: &str = "svc.cluster.local";

/// A secret as received from the cluster, with its data still base64-encoded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Namespace the secret lives in
    pub namespace: String,
    /// Secret name
    pub name: String,
    /// Base64-encoded values keyed by field name (`user`, `pass`, `key`, `service`)
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl CredentialRecord {
    /// Create an empty record for `namespace`/`name`
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    /// Add an already base64-encoded field
    pub fn with_field(mut self, field: impl Into<String>, encoded: impl Into<String>) -> Self {
        self.data.insert(field.into(), encoded.into());
        self
    }

    /// Raw (still encoded) value of a field
    pub fn field(&self, field: &str) -> Option<&str> {
        self.data.get(field).map(String::as_str)
    }
}

/// Key under which a credential is cached and looked up at login
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(pub String);

impl IdentityKey {
    /// Create a new identity key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the raw key string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IdentityKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IdentityKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Decoded, cache-resident credential for one identity
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// Login password
    pub password: String,
    /// Key material carried alongside the password
    pub key: String,
    /// Fully-qualified routing target, `{service}.{namespace}.svc.cluster.local`
    pub service: String,
}

impl CredentialEntry {
    /// Build an entry, qualifying `raw_service` with `namespace`
    pub fn new(
        password: impl Into<String>,
        key: impl Into<String>,
        raw_service: &str,
        namespace: &str,
    ) -> Self {
        Self {
            password: password.into(),
            key: key.into(),
            service: qualify_service(raw_service, namespace),
        }
    }
}

// Keep passwords out of logs and panic messages.
impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("password", &"<redacted>")
            .field("key", &self.key)
            .field("service", &self.service)
            .finish()
    }
}

/// Qualify a bare service name with its namespace and the cluster domain
pub fn qualify_service(raw_service: &str, namespace: &str) -> String {
    format!("{}.{}.{}", raw_service, namespace, CLUSTER_DOMAIN)
}
