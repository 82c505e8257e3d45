//! Fixed-capacity telemetry time-series store
//!
//! Holds the rolling (time, voltage, current) series the charting layer
//! plots, plus the discrete marker events drawn on top of it. Capacity is
//! fixed at construction for a bounded memory footprint; once full, the
//! oldest sample is evicted per push.
//!
//! The first sample of a session establishes the rebasing origin: every
//! stored sample carries `relative_time = absolute_time - origin`, so the
//! plotted series always starts at zero.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MarkerEvent, MarkerKind, TelemetrySample, seconds_since};

/// Default ring capacity, sized for tens of thousands of plotted points.
pub const DEFAULT_RING_CAPACITY: usize = 50_000;

/// Marker retention policy.
///
/// The charting layer may want markers kept for the whole session (scrubbing
/// back through history) or only within the visible trailing window. Both are
/// valid; the policy is configured per session rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MarkerPolicy {
    /// Markers are retained for the lifetime of the session.
    History,
    /// Markers older than the trailing window are trimmed on every push.
    Windowed { window_secs: f64 },
}

/// Fixed-capacity circular store for telemetry samples and markers.
#[derive(Debug)]
pub struct TelemetryRing {
    capacity: usize,
    policy: MarkerPolicy,
    origin: Option<DateTime<Utc>>,
    samples: VecDeque<TelemetrySample>,
    markers: VecDeque<MarkerEvent>,
}

impl TelemetryRing {
    pub fn new(capacity: usize, policy: MarkerPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            policy,
            origin: None,
            samples: VecDeque::with_capacity(capacity),
            markers: VecDeque::new(),
        }
    }

    /// Append a sample, rebasing its relative time against the session
    /// origin. Returns the stored (rebased) sample.
    pub fn push(&mut self, sample: TelemetrySample) -> TelemetrySample {
        let origin = *self.origin.get_or_insert(sample.absolute_time);
        let rebased = sample.rebased(origin);

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rebased);

        if let MarkerPolicy::Windowed { window_secs } = self.policy {
            let bound = self.window_start(window_secs);
            self.markers.retain(|marker| marker.relative_time >= bound);
        }

        rebased
    }

    /// Record a marker at `absolute_time`, deduplicated on
    /// `(relative_time, kind)`. Returns the stored marker, or `None` when an
    /// identical one already exists.
    pub fn add_marker(&mut self, kind: MarkerKind, absolute_time: DateTime<Utc>) -> Option<MarkerEvent> {
        let origin = *self.origin.get_or_insert(absolute_time);
        let relative_time = seconds_since(origin, absolute_time);

        let duplicate = self
            .markers
            .iter()
            .any(|m| m.kind == kind && m.relative_time.to_bits() == relative_time.to_bits());
        if duplicate {
            return None;
        }

        let marker = MarkerEvent { relative_time, kind };
        self.markers.push_back(marker);
        Some(marker)
    }

    /// Relative time of the newest sample, or zero when empty.
    pub fn latest_relative(&self) -> f64 {
        self.samples.back().map(|s| s.relative_time).unwrap_or(0.0)
    }

    /// Lower bound of a trailing window of `window_secs`, clamped at zero.
    pub fn window_start(&self, window_secs: f64) -> f64 {
        (self.latest_relative() - window_secs).max(0.0)
    }

    /// Snapshot of the stored samples, oldest first.
    pub fn samples(&self) -> Vec<TelemetrySample> {
        self.samples.iter().copied().collect()
    }

    /// Snapshot of the retained markers, oldest first.
    pub fn markers(&self) -> Vec<MarkerEvent> {
        self.markers.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Absolute time of the first sample, if any arrived yet.
    pub fn origin(&self) -> Option<DateTime<Utc>> {
        self.origin
    }

    /// Drop all samples, markers, and the rebasing origin.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.markers.clear();
        self.origin = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElectricalReadings;
    use chrono::TimeDelta;

    fn sample_at(origin: DateTime<Utc>, offset_ms: i64) -> TelemetrySample {
        TelemetrySample::new(
            origin + TimeDelta::milliseconds(offset_ms),
            ElectricalReadings {
                voltage: 5.0,
                current: 1.0,
                cc1: 0.0,
                cc2: 0.0,
                d_plus: 0.0,
                d_minus: 0.0,
            },
        )
    }

    #[test]
    fn first_sample_establishes_origin_at_zero() {
        let mut ring = TelemetryRing::new(16, MarkerPolicy::History);
        let t0 = Utc::now();

        let first = ring.push(sample_at(t0, 0));
        let second = ring.push(sample_at(t0, 250));

        assert_eq!(first.relative_time, 0.0);
        assert!((second.relative_time - 0.25).abs() < 1e-9);
        assert_eq!(ring.origin(), Some(t0));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut ring = TelemetryRing::new(3, MarkerPolicy::History);
        let t0 = Utc::now();
        for i in 0..5 {
            ring.push(sample_at(t0, i * 100));
        }

        assert_eq!(ring.len(), 3);
        let samples = ring.samples();
        assert!((samples[0].relative_time - 0.2).abs() < 1e-9);
        assert!((samples[2].relative_time - 0.4).abs() < 1e-9);
    }

    #[test]
    fn window_start_clamps_to_zero() {
        let mut ring = TelemetryRing::new(16, MarkerPolicy::History);
        let t0 = Utc::now();
        ring.push(sample_at(t0, 0));
        ring.push(sample_at(t0, 2_000));

        assert_eq!(ring.window_start(10.0), 0.0);
        assert!((ring.window_start(0.5) - 1.5).abs() < 1e-9);
        assert_eq!(TelemetryRing::new(4, MarkerPolicy::History).window_start(30.0), 0.0);
    }

    #[test]
    fn markers_deduplicate_on_time_and_kind() {
        let mut ring = TelemetryRing::new(16, MarkerPolicy::History);
        let t0 = Utc::now();
        ring.push(sample_at(t0, 0));

        let at = t0 + TimeDelta::milliseconds(40);
        assert!(ring.add_marker(MarkerKind::Capability, at).is_some());
        assert!(ring.add_marker(MarkerKind::Capability, at).is_none());
        // Same instant, different kind is a distinct marker
        assert!(ring.add_marker(MarkerKind::Request, at).is_some());
        assert_eq!(ring.markers().len(), 2);
    }

    #[test]
    fn history_policy_retains_markers_indefinitely() {
        let mut ring = TelemetryRing::new(4, MarkerPolicy::History);
        let t0 = Utc::now();
        ring.push(sample_at(t0, 0));
        ring.add_marker(MarkerKind::Capability, t0);
        for i in 1..50 {
            ring.push(sample_at(t0, i * 1_000));
        }

        assert_eq!(ring.markers().len(), 1);
    }

    #[test]
    fn windowed_policy_trims_stale_markers() {
        let mut ring = TelemetryRing::new(64, MarkerPolicy::Windowed { window_secs: 1.0 });
        let t0 = Utc::now();
        ring.push(sample_at(t0, 0));
        ring.add_marker(MarkerKind::Capability, t0);
        ring.add_marker(MarkerKind::Request, t0 + TimeDelta::milliseconds(900));

        // Pushing past the window trims the marker at t=0 but keeps t=0.9
        ring.push(sample_at(t0, 1_800));
        let markers = ring.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].kind, MarkerKind::Request);
    }

    #[test]
    fn clear_resets_origin_and_series() {
        let mut ring = TelemetryRing::new(16, MarkerPolicy::History);
        let t0 = Utc::now();
        ring.push(sample_at(t0, 0));
        ring.add_marker(MarkerKind::Capability, t0);

        ring.clear();
        assert!(ring.is_empty());
        assert!(ring.markers().is_empty());
        assert_eq!(ring.origin(), None);

        // A fresh origin is established by the next push
        let later = ring.push(sample_at(t0, 5_000));
        assert_eq!(later.relative_time, 0.0);
    }
}
