//! Rolling decode context shared by live capture and replay
//!
//! Some protocol messages are only interpretable relative to the most
//! recently seen capability/request/extended message. [`DecodeContext`] is
//! the minimal rolling state that makes those decodes possible, and
//! [`decode_step`] is the single pipeline step - classify, decode, stamp,
//! update context - that both the acquisition worker and the replay decoder
//! run. Sharing the step is what makes replay parity a structural property
//! instead of a convention.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::decoder::{DecodeError, DecodedFrame, Decoder};
use crate::types::{DecodedMessage, RawFrame, TelemetrySample};

/// Which context slots a control message provides.
///
/// Computed once per message from the decoder's predicates; multiple flags
/// may be set for the same message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Provides {
    pub capability: bool,
    pub request: bool,
    pub extended: bool,
}

impl Provides {
    /// Whether any context slot is provided.
    pub fn any(&self) -> bool {
        self.capability || self.request || self.extended
    }
}

/// Rolling record of the last-seen context-providing messages.
///
/// Single-writer: owned by the acquisition worker during live capture, by
/// the replay decoder during import. Slots are only ever overwritten whole,
/// never merged; `reset` empties all of them on a new connection or session
/// clear.
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    last_capability: Option<Arc<DecodedMessage>>,
    last_request: Option<Arc<DecodedMessage>>,
    last_extended: Option<Arc<DecodedMessage>>,
}

impl DecodeContext {
    /// An empty context, as seeded at the start of every capture and replay.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_capability(&self) -> Option<&Arc<DecodedMessage>> {
        self.last_capability.as_ref()
    }

    pub fn last_request(&self) -> Option<&Arc<DecodedMessage>> {
        self.last_request.as_ref()
    }

    pub fn last_extended(&self) -> Option<&Arc<DecodedMessage>> {
        self.last_extended.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.last_capability.is_none() && self.last_request.is_none() && self.last_extended.is_none()
    }

    /// Overwrite the slots the message provides; untouched slots keep their
    /// prior value.
    pub fn update(&mut self, provides: Provides, message: &Arc<DecodedMessage>) {
        if provides.capability {
            self.last_capability = Some(Arc::clone(message));
        }
        if provides.request {
            self.last_request = Some(Arc::clone(message));
        }
        if provides.extended {
            self.last_extended = Some(Arc::clone(message));
        }
    }

    /// Empty all slots.
    pub fn reset(&mut self) {
        self.last_capability = None;
        self.last_request = None;
        self.last_extended = None;
    }
}

/// Output of one pipeline step over a decodable frame.
#[derive(Debug, Clone)]
pub enum DecodedEvent {
    /// Telemetry sample with the power figure already derived.
    Telemetry(TelemetrySample),
    /// Control message, plus which context slots it provided.
    Control { message: Arc<DecodedMessage>, provides: Provides },
}

/// Run one frame through the decode pipeline.
///
/// Decodes `frame` against the current context, stamps control messages with
/// `timestamp`, and advances the context for every context-providing message.
/// `Other` frames yield `Ok(None)` and leave the context untouched, as do
/// decode failures (the caller counts those).
///
/// Determinism: given the same starting context and the same ordered frames,
/// repeated runs yield identical context transitions and identical events
/// (timestamps aside), because the decoder contract requires purity.
pub fn decode_step<D: Decoder + ?Sized>(
    decoder: &D,
    context: &mut DecodeContext,
    frame: &RawFrame,
    timestamp: DateTime<Utc>,
) -> Result<Option<DecodedEvent>, DecodeError> {
    match decoder.decode(frame, context)? {
        DecodedFrame::Telemetry(readings) => {
            Ok(Some(DecodedEvent::Telemetry(TelemetrySample::new(timestamp, readings))))
        }
        DecodedFrame::Control(control) => {
            let provides = Provides {
                capability: decoder.provides_capability(&control),
                request: decoder.provides_request(&control),
                extended: decoder.provides_extended(&control),
            };
            let message = Arc::new(DecodedMessage {
                timestamp,
                sop: control.sop,
                revision: control.revision,
                power_role: control.power_role,
                data_role: control.data_role,
                message_type: control.message_type,
                payload: control.payload,
                raw: *frame,
            });
            context.update(provides, &message);
            Ok(Some(DecodedEvent::Control { message, provides }))
        }
        DecodedFrame::Other => Ok(None),
    }
}
