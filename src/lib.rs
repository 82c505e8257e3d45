//! Acquisition and decode engine for USB Power Delivery sniffer devices.
//!
//! `pdtap` ingests the fixed 64-byte reports a bench-top PD sniffer produces,
//! classifies each as protocol-control traffic or electrical telemetry,
//! decodes control traffic with a rolling decode context, and exposes an
//! ordered message log plus a rolling telemetry time-series to a presentation
//! layer.
//!
//! # Features
//!
//! - **Live capture**: an isolated worker task owns the device transport and
//!   feeds bounded, drop-on-full channels - device reads never stall
//! - **Context-carrying decode**: request messages decode against the last
//!   capability message, rebuilt identically in live capture and replay
//! - **Replay parity**: importing stored frames reproduces the live decode
//!   results bit-for-bit for the same byte sequences
//! - **Lifecycle safety**: connection confirmation gating, pause/resume,
//!   typed fatal/transient transport errors, clean disconnect handling
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use pdtap::{SessionController, Decoder, Transport};
//!
//! # async fn capture<D: Decoder, T: Transport>(decoder: D, transport: T) -> pdtap::Result<()> {
//! let session = SessionController::new(decoder);
//! session.connect(transport).await?;
//! session.resume()?; // applied once the first event confirms the device
//!
//! let mut samples = Box::pin(session.sample_updates());
//! while let Some(sample) = samples.next().await {
//!     println!("{:.2} V  {:.3} A  {:.2} W", sample.voltage, sample.current, sample.power);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Offline replay of stored records goes through the same decode pipeline:
//!
//! ```rust,no_run
//! use pdtap::{ImportRecord, SessionController};
//! # fn replay<D: pdtap::Decoder>(session: &SessionController<D>) -> pdtap::Result<()> {
//! let rows = vec![ImportRecord::new("A1FF03...")];
//! let outcome = session.import_records(&rows)?;
//! println!("{} decoded, {} failed", outcome.decoded, outcome.failed);
//! # Ok(())
//! # }
//! ```

// Core types and error handling
mod error;
pub mod types;

// Decode pipeline
pub mod context;
pub mod decoder;

// Acquisition architecture
pub mod replay;
pub mod ring;
pub mod session;
pub mod transport;
mod worker;

#[cfg(test)]
pub(crate) mod test_utils;

// Core exports
pub use error::{Result, SnifferError};
pub use types::*;

// Pipeline exports
pub use context::{DecodeContext, DecodedEvent, Provides, decode_step};
pub use decoder::{ControlFrame, DecodeError, DecodedFrame, Decoder};
pub use transport::{Transport, TransportError};

// Session exports
pub use ring::{DEFAULT_RING_CAPACITY, MarkerPolicy, TelemetryRing};
pub use session::{ConnectionState, QuickStatus, SessionConfig, SessionController};

// Replay and export
pub use replay::{ExportRecord, ImportRecord, ReplayDecoder, ReplayOutcome};
