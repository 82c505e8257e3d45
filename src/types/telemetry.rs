//! Electrical telemetry samples and marker events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Electrical readings decoded from a telemetry frame.
///
/// This is what the decoder adapter reports; derived quantities (power,
/// relative time) are computed by the engine, never taken from the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElectricalReadings {
    /// Bus voltage in volts.
    pub voltage: f64,
    /// Bus current in amps.
    pub current: f64,
    pub cc1: f64,
    pub cc2: f64,
    pub d_plus: f64,
    pub d_minus: f64,
}

/// One point of the telemetry time-series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub absolute_time: DateTime<Utc>,
    /// Seconds since the first sample of the session; zero until rebased by
    /// the ring buffer.
    pub relative_time: f64,
    pub voltage: f64,
    pub current: f64,
    /// Always recomputed as `|voltage * current|`.
    pub power: f64,
    pub cc1: f64,
    pub cc2: f64,
    pub d_plus: f64,
    pub d_minus: f64,
}

impl TelemetrySample {
    /// Build a sample from decoder readings, deriving the power figure.
    pub fn new(absolute_time: DateTime<Utc>, readings: ElectricalReadings) -> Self {
        Self {
            absolute_time,
            relative_time: 0.0,
            voltage: readings.voltage,
            current: readings.current,
            power: (readings.voltage * readings.current).abs(),
            cc1: readings.cc1,
            cc2: readings.cc2,
            d_plus: readings.d_plus,
            d_minus: readings.d_minus,
        }
    }

    /// Copy of the sample with `relative_time` rebased against `origin`.
    ///
    /// A sample stamped before the origin (clock skew on the first few
    /// reports) clamps to zero rather than going negative.
    pub(crate) fn rebased(mut self, origin: DateTime<Utc>) -> Self {
        self.relative_time = seconds_since(origin, self.absolute_time);
        self
    }
}

/// Which kind of context-providing message a marker records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    /// A capability (PDO) message was seen.
    Capability,
    /// A request (RDO) message was seen.
    Request,
}

/// A discrete event plotted alongside the telemetry series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerEvent {
    /// Seconds since the first sample of the session.
    pub relative_time: f64,
    pub kind: MarkerKind,
}

/// Seconds between `origin` and `at`, clamped at zero.
pub(crate) fn seconds_since(origin: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    let micros = (at - origin).num_microseconds().unwrap_or(i64::MAX);
    (micros as f64 / 1_000_000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn readings(voltage: f64, current: f64) -> ElectricalReadings {
        ElectricalReadings { voltage, current, cc1: 0.0, cc2: 0.0, d_plus: 0.0, d_minus: 0.0 }
    }

    #[test]
    fn power_is_derived_and_absolute() {
        let sample = TelemetrySample::new(Utc::now(), readings(5.0, 1.5));
        assert_eq!(sample.power, 7.5);

        // Sink-direction current still yields positive power
        let sample = TelemetrySample::new(Utc::now(), readings(20.0, -2.25));
        assert_eq!(sample.power, 45.0);
    }

    #[test]
    fn rebasing_clamps_pre_origin_samples_to_zero() {
        let origin = Utc::now();
        let sample = TelemetrySample::new(origin - TimeDelta::milliseconds(5), readings(5.0, 1.0));
        assert_eq!(sample.rebased(origin).relative_time, 0.0);

        let sample = TelemetrySample::new(origin + TimeDelta::milliseconds(1500), readings(5.0, 1.0));
        let rebased = sample.rebased(origin);
        assert!((rebased.relative_time - 1.5).abs() < 1e-9);
    }
}
