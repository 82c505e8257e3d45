//! Offline replay of stored capture frames
//!
//! The replay decoder is the offline counterpart of the acquisition worker:
//! it consumes previously stored records in order, normalizes each payload to
//! a 64-byte frame, and runs the exact same pipeline step as live capture,
//! seeded from an empty context. For identical byte sequences the two paths
//! produce identical decode results; any divergence is a correctness defect,
//! which is why both call [`crate::context::decode_step`] rather than
//! carrying separate decode logic.
//!
//! Pause/resume semantics do not apply here: every decodable control frame is
//! surfaced. Malformed rows are counted and skipped; they never abort a run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::context::{DecodeContext, DecodedEvent, decode_step};
use crate::decoder::Decoder;
use crate::types::{DecodedMessage, RawFrame};
use crate::{Result, SnifferError};

/// One stored capture record, as parsed out of an export file.
///
/// The payload is a variable-length hex string; normalization to exactly 64
/// bytes (truncate beyond, zero-pad short) happens here, as part of the
/// engine's contract with storage. Records without a timestamp are stamped
/// with the wall clock at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub raw: String,
}

impl ImportRecord {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { timestamp: None, raw: raw.into() }
    }

    pub fn with_timestamp(timestamp: DateTime<Utc>, raw: impl Into<String>) -> Self {
        Self { timestamp: Some(timestamp), raw: raw.into() }
    }
}

/// Tally of a finished import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    /// Control messages appended to the log.
    pub decoded: usize,
    /// Rows that decoded but carried no control message (telemetry, other).
    pub skipped: usize,
    /// Malformed or undecodable rows.
    pub failed: usize,
}

/// Stateful offline decoder over an ordered sequence of stored frames.
pub struct ReplayDecoder<D> {
    decoder: Arc<D>,
    context: DecodeContext,
    failures: usize,
}

impl<D: Decoder> ReplayDecoder<D> {
    /// Start a replay run, seeded from an empty context.
    pub fn new(decoder: Arc<D>) -> Self {
        Self { decoder, context: DecodeContext::new(), failures: 0 }
    }

    /// Decode one stored record.
    ///
    /// Returns `Ok(None)` for decodable rows that carry no event
    /// (unclassified frames). Malformed payloads and adapter rejections
    /// return `Err` and bump the failure count; the context is unchanged and
    /// the run continues.
    pub fn decode_record(&mut self, record: &ImportRecord) -> Result<Option<DecodedEvent>> {
        let frame = match RawFrame::from_hex(&record.raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.failures += 1;
                trace!(%e, "import row rejected");
                return Err(e);
            }
        };
        let timestamp = record.timestamp.unwrap_or_else(Utc::now);
        self.decode_frame(&frame, timestamp)
    }

    /// Decode one already-normalized frame.
    pub fn decode_frame(
        &mut self,
        frame: &RawFrame,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<DecodedEvent>> {
        match decode_step(self.decoder.as_ref(), &mut self.context, frame, timestamp) {
            Ok(event) => Ok(event),
            Err(e) => {
                self.failures += 1;
                trace!(%e, "stored frame skipped");
                Err(SnifferError::from(e))
            }
        }
    }

    /// Rows rejected so far in this run.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// The rolling context as rebuilt from the rows decoded so far.
    pub fn context(&self) -> &DecodeContext {
        &self.context
    }
}

/// One export row per logged control message.
///
/// Rendering to CSV or JSON is the embedder's concern; the engine supplies
/// the raw hex and the rendered payload text alongside the header columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// 1-based position in the message log.
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub sop: String,
    pub revision: Option<String>,
    pub power_role: Option<String>,
    pub data_role: Option<String>,
    pub message_type: String,
    /// Rendered textual form of the decoded tree.
    pub detail: String,
    /// Uppercase hex of the raw frame.
    pub raw: String,
}

impl ExportRecord {
    pub fn from_message(index: usize, message: &DecodedMessage) -> Self {
        Self {
            index,
            timestamp: message.timestamp,
            sop: message.sop.clone(),
            revision: message.revision.clone(),
            power_role: message.power_role.clone(),
            data_role: message.data_role.clone(),
            message_type: message.message_type.clone(),
            detail: message.render_text(),
            raw: message.raw_hex(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedDecoder, control_frame, telemetry_frame};

    #[test]
    fn malformed_rows_are_counted_and_do_not_abort() {
        let mut replay = ReplayDecoder::new(Arc::new(ScriptedDecoder::new()));

        assert!(replay.decode_record(&ImportRecord::new("not-hex")).is_err());
        assert!(replay.decode_record(&ImportRecord::new(control_frame(0x10).to_hex())).is_ok());
        assert!(replay.decode_record(&ImportRecord::new("FF")).is_err());

        assert_eq!(replay.failures(), 2);
        assert!(replay.context().last_capability().is_some());
    }

    #[test]
    fn context_rebuilds_identically_from_stored_rows() {
        let decoder = Arc::new(ScriptedDecoder::new());
        let rows = [
            ImportRecord::new(control_frame(0x10).to_hex()),
            ImportRecord::new(telemetry_frame(5.0, 1.0).to_hex()),
            ImportRecord::new(control_frame(0x11).to_hex()),
        ];

        let mut replay = ReplayDecoder::new(decoder);
        let mut messages = Vec::new();
        for row in &rows {
            if let Ok(Some(DecodedEvent::Control { message, .. })) = replay.decode_record(row) {
                messages.push(message);
            }
        }

        assert_eq!(messages.len(), 2);
        // The request row decoded against the capability row before it
        assert!(messages[1].render_text().contains("Source_Capabilities"));
        assert_eq!(
            replay.context().last_request().unwrap().message_type,
            "Request"
        );
    }

    #[test]
    fn export_record_carries_hex_and_rendered_detail() {
        let decoder = Arc::new(ScriptedDecoder::new());
        let mut replay = ReplayDecoder::new(decoder);
        let frame = control_frame(0x10);
        let event = replay
            .decode_record(&ImportRecord::new(frame.to_hex()))
            .unwrap()
            .unwrap();

        let DecodedEvent::Control { message, .. } = event else {
            panic!("expected a control message");
        };
        let record = ExportRecord::from_message(1, &message);
        assert_eq!(record.index, 1);
        assert_eq!(record.message_type, "Source_Capabilities");
        assert_eq!(record.raw, frame.to_hex());
        assert!(record.detail.contains("Message Type"));
    }
}
