//! Session lifecycle and the consumer side of the pipeline

mod controller;
mod state;

pub use controller::{QuickStatus, SessionController};
pub use state::ConnectionState;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ring::{DEFAULT_RING_CAPACITY, MarkerPolicy};

/// Tunables for a capture session.
///
/// The defaults match the device's behavior in practice: reports arrive at
/// up to ~1 kHz, so a 512-slot channel absorbs bursts across 10 ms drain
/// ticks, and the 100 ms readout interval down-samples the human-readable
/// display without touching the plotted series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bounded capacity of each worker channel; sends drop when full.
    pub channel_capacity: usize,
    /// Consumer poll tick for draining both channels.
    pub drain_interval: Duration,
    /// Minimum gap between low-frequency readout samples.
    pub readout_interval: Duration,
    /// Worker back-off after a transient transport error.
    pub retry_delay: Duration,
    /// How long shutdown waits for the worker before aborting it.
    pub stop_timeout: Duration,
    /// Telemetry ring capacity in samples.
    pub ring_capacity: usize,
    /// Marker retention policy for the telemetry ring.
    pub marker_policy: MarkerPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 512,
            drain_interval: Duration::from_millis(10),
            readout_interval: Duration::from_millis(100),
            retry_delay: Duration::from_millis(50),
            stop_timeout: Duration::from_millis(500),
            ring_capacity: DEFAULT_RING_CAPACITY,
            marker_policy: MarkerPolicy::History,
        }
    }
}
