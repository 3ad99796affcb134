//! The credential sync loop
//!
//! A cycle fetches every record from the [`SecretSource`], decodes each one
//! independently, and hands the complete replacement mapping to the
//! [`CredentialStore`] in a single `replace_all`. The cache is a mirror:
//! identities missing from the latest fetch disappear from it.
//!
//! A source failure or timeout abandons the cycle before the store is
//! touched. Undecodable records are skipped one by one.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ksa_core::{
    decode_record, CredentialMap, CredentialRecord, CredentialStore, DecodeError, SourceError,
    StoreError,
};

use crate::schedule::{SingleFlight, TickSource};
use crate::source::SecretSource;

/// Externally visible loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Waiting for the next tick
    Idle,
    /// A fetch/decode/commit cycle is in progress
    Syncing,
}

/// A record left out of the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub namespace: String,
    pub name: String,
    pub reason: DecodeError,
}

/// Summary of a committed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records returned by the source
    pub fetched: usize,
    /// Entries in the committed mapping
    pub committed: usize,
    /// Records that failed to decode
    pub skipped: Vec<SkippedRecord>,
    /// Records whose identity key was already taken earlier in the batch
    pub duplicates: usize,
}

/// Result of one [`SyncLoop::run_cycle`] call
#[derive(Debug)]
pub enum CycleOutcome {
    /// The store now mirrors the latest fetch
    Committed(CycleReport),
    /// The source could not be read; the store is unchanged
    SourceFailed(SourceError),
    /// The replacement could not be written; the store is unchanged
    CommitFailed(StoreError),
    /// Another cycle was still running; nothing was done
    Overlapping,
}

impl CycleOutcome {
    /// Whether this cycle replaced the store contents
    pub fn is_committed(&self) -> bool {
        matches!(self, CycleOutcome::Committed(_))
    }
}

/// Periodic mirror of the secret source into the credential store
pub struct SyncLoop {
    source: Arc<dyn SecretSource>,
    store: Arc<dyn CredentialStore>,
    fetch_timeout: Duration,
    flight: SingleFlight,
}

impl SyncLoop {
    /// Create a loop writing `source`'s records into `store`
    pub fn new(
        source: Arc<dyn SecretSource>,
        store: Arc<dyn CredentialStore>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            fetch_timeout,
            flight: SingleFlight::new(),
        }
    }

    /// Current loop state
    pub fn state(&self) -> SyncState {
        if self.flight.is_busy() {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    /// Run cycles on every tick until `cancel` fires.
    ///
    /// Cycles run inline, so a slow cycle holds back the next tick instead
    /// of overlapping with it. Failures are logged and the loop carries on.
    pub async fn run<T: TickSource>(&self, mut ticks: T, cancel: CancellationToken) {
        tracing::info!(
            "Starting credential sync loop (fetch timeout: {:?})",
            self.fetch_timeout
        );

        loop {
            // Cancellation is checked first so no cycle starts after shutdown
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Credential sync loop shutting down");
                    break;
                }
                _ = ticks.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Perform a single fetch, decode and commit
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = self.flight.try_begin() else {
            tracing::warn!("Sync cycle requested while another is running, ignoring");
            return CycleOutcome::Overlapping;
        };

        let records = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                tracing::error!("Sync cycle failed, keeping previous cache: {}", e);
                return CycleOutcome::SourceFailed(e);
            }
            Err(_) => {
                let e = SourceError::Timeout(self.fetch_timeout);
                tracing::error!("Sync cycle failed, keeping previous cache: {}", e);
                return CycleOutcome::SourceFailed(e);
            }
        };

        let (mapping, report) = build_mapping(&records);
        for skipped in &report.skipped {
            tracing::warn!(
                "Skipping secret {}/{}: {}",
                skipped.namespace,
                skipped.name,
                skipped.reason
            );
        }

        let store = Arc::clone(&self.store);
        let committed = tokio::task::spawn_blocking(move || store.replace_all(mapping)).await;
        match committed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Failed to commit credential cache: {}", e);
                return CycleOutcome::CommitFailed(e);
            }
            Err(e) => {
                let e = StoreError::Aborted(e.to_string());
                tracing::error!("Failed to commit credential cache: {}", e);
                return CycleOutcome::CommitFailed(e);
            }
        }

        tracing::info!(
            "Credential cache updated: {} entries ({} fetched, {} skipped, {} duplicates)",
            report.committed,
            report.fetched,
            report.skipped.len(),
            report.duplicates
        );
        CycleOutcome::Committed(report)
    }
}

/// Decode `records` into a complete replacement mapping.
///
/// Later records win when two decode to the same identity key.
pub fn build_mapping(records: &[CredentialRecord]) -> (CredentialMap, CycleReport) {
    let mut mapping = CredentialMap::new();
    let mut report = CycleReport {
        fetched: records.len(),
        ..CycleReport::default()
    };

    for record in records {
        match decode_record(record) {
            Ok(decoded) => {
                if mapping.insert(decoded.identity.clone(), decoded.entry).is_some() {
                    tracing::warn!(
                        "Identity {} redefined by {}/{}, last one wins",
                        decoded.identity,
                        record.namespace,
                        record.name
                    );
                    report.duplicates += 1;
                }
            }
            Err(reason) => report.skipped.push(SkippedRecord {
                namespace: record.namespace.clone(),
                name: record.name.clone(),
                reason,
            }),
        }
    }

    report.committed = mapping.len();
    (mapping, report)
}
