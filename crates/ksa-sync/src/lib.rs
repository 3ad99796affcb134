//! ksa-sync: Credential sync daemon
//!
//! Periodically lists credential secrets from the Kubernetes API, decodes
//! them, and atomically replaces the local credential cache that the login
//! hook reads. A failed cycle never touches the cache; the previous contents
//! stay authoritative until the next successful one.

pub mod schedule;
pub mod source;
pub mod sync_loop;

pub use schedule::{FlightGuard, IntervalTicks, SingleFlight, TickSource};
pub use source::{KubeSecretSource, SecretSource};
pub use sync_loop::{build_mapping, CycleOutcome, CycleReport, SkippedRecord, SyncLoop, SyncState};
