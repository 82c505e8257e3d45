//! Decoder adapter boundary
//!
//! The byte-level protocol decoder is an external collaborator: the engine
//! hands it a raw 64-byte frame plus the current [`DecodeContext`] and gets
//! back a classified, decoded frame. The trait also supplies the three
//! context predicates that drive [`DecodeContext`] updates and marker
//! emission.
//!
//! Implementations MUST be pure: identical `(frame, context)` inputs must
//! produce identical outputs. Replay parity between live capture and stored
//! frame import depends on it.

use thiserror::Error;

use crate::context::DecodeContext;
use crate::types::{ElectricalReadings, PayloadNode, RawFrame};

/// Error returned when the adapter rejects a frame.
///
/// Decode failures are per-frame events: the frame is counted and skipped,
/// the context is left unchanged, and the pipeline continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("undecodable frame: {details}")]
pub struct DecodeError {
    details: String,
}

impl DecodeError {
    pub fn new(details: impl Into<String>) -> Self {
        Self { details: details.into() }
    }
}

/// Decoded content of a protocol-control frame, before timestamping.
///
/// The engine turns this into a [`crate::DecodedMessage`] by stamping the
/// acquisition time and attaching the raw frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    pub sop: String,
    pub revision: Option<String>,
    pub power_role: Option<String>,
    pub data_role: Option<String>,
    pub message_type: String,
    pub payload: PayloadNode,
}

/// Result of decoding one raw frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// Electrical measurement; flows to the telemetry ring.
    Telemetry(ElectricalReadings),
    /// Protocol message; flows to the message log.
    Control(ControlFrame),
    /// Recognized but uninteresting; discarded.
    Other,
}

/// Trait for byte-level protocol decoders.
///
/// `decode` may consult the rolling context to interpret context-dependent
/// messages (a request is only meaningful relative to the last capability
/// message). The `provides_*` predicates identify context-providing messages;
/// several may fire for the same message independently.
pub trait Decoder: Send + Sync + 'static {
    /// Decode one normalized 64-byte frame.
    fn decode(&self, frame: &RawFrame, context: &DecodeContext)
    -> Result<DecodedFrame, DecodeError>;

    /// Whether this message announces source/sink capabilities (PDOs).
    fn provides_capability(&self, message: &ControlFrame) -> bool;

    /// Whether this message requests a capability (RDO).
    fn provides_request(&self, message: &ControlFrame) -> bool;

    /// Whether this message establishes extended-message context.
    fn provides_extended(&self, message: &ControlFrame) -> bool;
}
