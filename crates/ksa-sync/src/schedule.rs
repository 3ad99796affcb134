//! Sync scheduling primitives
//!
//! [`TickSource`] decides when a cycle may start and [`SingleFlight`] makes
//! sure at most one cycle runs at a time. Both are separate from the sync
//! loop so tests can drive ticks by hand or run under a paused clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Interval, MissedTickBehavior};

/// Source of "start a cycle now" events
#[async_trait]
pub trait TickSource: Send {
    /// Wait for the next tick
    async fn tick(&mut self);
}

/// Fixed-period ticks without jitter.
///
/// The first tick completes immediately. When a cycle overruns the period,
/// the next tick fires as soon as it is awaited and later ticks are spaced a
/// full period from there: ticks are delayed, never skipped or bunched.
#[derive(Debug)]
pub struct IntervalTicks {
    interval: Interval,
}

impl IntervalTicks {
    /// Tick every `period`
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Configured period
    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl TickSource for IntervalTicks {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Guard allowing a single in-flight operation
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    /// Create an idle guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flight. Returns `None` while another holder is active.
    pub fn try_begin(&self) -> Option<FlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Whether a holder is currently active
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases its [`SingleFlight`] when dropped
#[derive(Debug)]
pub struct FlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
