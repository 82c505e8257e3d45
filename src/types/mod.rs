//! Core types for capture data representation.
//!
//! This module provides the foundational data structures flowing through the
//! acquisition pipeline:
//!
//! - [`RawFrame`] is the fixed 64-byte report every other value derives from,
//!   with the pad/truncate normalization the import contract requires
//! - [`DecodedMessage`] and [`PayloadNode`] carry decoded protocol-control
//!   traffic; the payload tree is opaque to the engine
//! - [`TelemetrySample`] and [`MarkerEvent`] make up the telemetry
//!   time-series consumed by the charting layer
//!
//! Messages are immutable once constructed and shared via `Arc`; readers of
//! the log and ring always get snapshot copies.

mod frame;
mod message;
mod telemetry;

pub use frame::{FRAME_LEN, RawFrame};
pub use message::{DecodedMessage, PayloadNode, PayloadValue};
pub use telemetry::{ElectricalReadings, MarkerEvent, MarkerKind, TelemetrySample};

pub(crate) use telemetry::seconds_since;
