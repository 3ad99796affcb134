//! ksa-exporter: Active SSH session gauge
//!
//! Periodically scans the host authentication log, estimates how many SSH
//! sessions are open, and serves the figure as `ssh_active_sessions` on a
//! Prometheus `/metrics` endpoint. Independent of the credential pipeline.

pub mod metrics;
pub mod refresh;
pub mod server;
pub mod sessions;

pub use metrics::SessionGauge;
pub use refresh::{refresh_once, run_refresh};
pub use server::{router, serve};
pub use sessions::{count_active_sessions, count_log_file};
