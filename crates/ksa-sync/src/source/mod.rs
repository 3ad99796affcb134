//! Secret source adapters

mod kube;

pub use kube::KubeSecretSource;

use async_trait::async_trait;
use ksa_core::{CredentialRecord, SourceError};

/// Read-only view of the cluster's credential secrets
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch every record currently matching the source's selector.
    ///
    /// Each call is a complete snapshot; nothing is carried between calls.
    async fn fetch(&self) -> Result<Vec<CredentialRecord>, SourceError>;
}
