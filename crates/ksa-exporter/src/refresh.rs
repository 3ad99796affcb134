//! Periodic log scan feeding the gauge

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::metrics::SessionGauge;
use crate::sessions::count_log_file;

/// Scan `log_path` once and publish the result.
///
/// On error the gauge keeps its previous value.
pub async fn refresh_once(log_path: &Path, gauge: &SessionGauge) -> io::Result<u64> {
    let path = log_path.to_path_buf();
    let sessions = tokio::task::spawn_blocking(move || count_log_file(&path))
        .await
        .map_err(io::Error::other)??;

    gauge.set(sessions);
    Ok(sessions)
}

/// Rescan `log_path` every `interval` until `cancel` fires.
///
/// The first scan runs immediately. Read failures are logged and the loop
/// carries on.
pub async fn run_refresh(
    log_path: PathBuf,
    interval: Duration,
    gauge: Arc<SessionGauge>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Session refresh stopping");
                break;
            }
            _ = ticker.tick() => {
                match refresh_once(&log_path, &gauge).await {
                    Ok(sessions) => tracing::debug!(sessions, "Session count refreshed"),
                    Err(e) => tracing::warn!("Failed to read {:?}: {}", log_path, e),
                }
            }
        }
    }
}
