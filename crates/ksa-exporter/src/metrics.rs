//! Prometheus registry for the exporter

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Metric name published for the session count
pub const ACTIVE_SESSIONS_METRIC: &str = "ssh_active_sessions";

/// Registry holding the `ssh_active_sessions` gauge
#[derive(Debug)]
pub struct SessionGauge {
    registry: Registry,
    active_sessions: Gauge,
}

impl SessionGauge {
    /// Create a registry with the gauge registered at zero
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let active_sessions: Gauge = Gauge::default();
        registry.register(
            ACTIVE_SESSIONS_METRIC,
            "Number of active SSH sessions",
            active_sessions.clone(),
        );

        Self {
            registry,
            active_sessions,
        }
    }

    /// Publish a new session count
    pub fn set(&self, sessions: u64) {
        self.active_sessions
            .set(i64::try_from(sessions).unwrap_or(i64::MAX));
    }

    /// Currently published value
    pub fn get(&self) -> i64 {
        self.active_sessions.get()
    }

    /// Render the registry in the OpenMetrics text format
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for SessionGauge {
    fn default() -> Self {
        Self::new()
    }
}
