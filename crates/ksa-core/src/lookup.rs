//! Login-time credential lookup
//!
//! Runs inline with an interactive login, so it only ever touches the
//! already-materialized store. Any error or ambiguity resolves to
//! [`Decision::Rejected`].

use crate::store::CredentialStore;

/// Outcome of an authentication attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Password matched; carries the fully-qualified service to route to
    Accepted(String),
    /// Unknown identity, wrong password, or the cache could not be read
    Rejected,
}

impl Decision {
    /// Whether the login should be allowed
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted(_))
    }

    /// Routing target for an accepted login
    pub fn service_target(&self) -> Option<&str> {
        match self {
            Decision::Accepted(service) => Some(service),
            Decision::Rejected => None,
        }
    }
}

/// Check `presented_secret` against the password cached for `identity`.
///
/// The comparison is exact: no trimming, case folding or normalization.
pub fn authenticate(store: &dyn CredentialStore, identity: &str, presented_secret: &str) -> Decision {
    if identity.is_empty() || presented_secret.is_empty() {
        tracing::debug!("Rejecting login with empty identity or secret");
        return Decision::Rejected;
    }

    let entry = match store.get(identity) {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            tracing::info!(identity, "Rejecting login: identity not in cache");
            return Decision::Rejected;
        }
        Err(e) => {
            tracing::warn!(identity, "Rejecting login: {}", e);
            return Decision::Rejected;
        }
    };

    if entry.password.is_empty() || !secrets_equal(presented_secret, &entry.password) {
        tracing::info!(identity, "Rejecting login: password mismatch");
        return Decision::Rejected;
    }

    tracing::info!(identity, service = %entry.service, "Login accepted");
    Decision::Accepted(entry.service)
}

/// Exact byte equality that does not stop at the first differing byte
fn secrets_equal(presented: &str, expected: &str) -> bool {
    if presented.len() != expected.len() {
        return false;
    }

    let mut diff = 0u8;
    for (a, b) in presented.bytes().zip(expected.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}
