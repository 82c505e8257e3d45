//! Test fixtures: a scripted transport and a deterministic decoder
//!
//! The scripted decoder interprets a synthetic frame layout so tests can
//! author byte-exact frames:
//!
//! - byte 0 tags the frame: `0x54` telemetry, `0x43` control, `0xFF`
//!   undecodable, anything else unclassified
//! - telemetry frames carry little-endian `f32` readings at offsets 4, 8,
//!   12, 16, 20, 24 (voltage, current, cc1, cc2, d+, d-)
//! - control frames carry a message code in byte 1 and the SOP in byte 2;
//!   a `Request` renders a `Copy of PDO` field from the last capability in
//!   the decode context, exercising context-dependent decode

#![cfg(test)]

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use crate::decoder::{ControlFrame, DecodeError, DecodedFrame, Decoder};
use crate::context::DecodeContext;
use crate::transport::{Transport, TransportError};
use crate::types::{ElectricalReadings, FRAME_LEN, PayloadNode, RawFrame};

pub fn telemetry_frame(voltage: f64, current: f64) -> RawFrame {
    let mut bytes = [0u8; FRAME_LEN];
    bytes[0] = 0x54;
    bytes[4..8].copy_from_slice(&(voltage as f32).to_le_bytes());
    bytes[8..12].copy_from_slice(&(current as f32).to_le_bytes());
    RawFrame::from_bytes(&bytes)
}

pub fn control_frame(code: u8) -> RawFrame {
    let mut bytes = [0u8; FRAME_LEN];
    bytes[0] = 0x43;
    bytes[1] = code;
    RawFrame::from_bytes(&bytes)
}

pub fn undecodable_frame() -> RawFrame {
    RawFrame::from_bytes(&[0xFF])
}

pub fn unclassified_frame() -> RawFrame {
    RawFrame::default()
}

/// Pure decoder over the synthetic layout above.
pub struct ScriptedDecoder;

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ScriptedDecoder {
    fn decode(
        &self,
        frame: &RawFrame,
        context: &DecodeContext,
    ) -> Result<DecodedFrame, DecodeError> {
        let bytes = frame.as_bytes();
        match bytes[0] {
            0x54 => {
                let reading = |at: usize| {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(&bytes[at..at + 4]);
                    f32::from_le_bytes(raw) as f64
                };
                Ok(DecodedFrame::Telemetry(ElectricalReadings {
                    voltage: reading(4),
                    current: reading(8),
                    cc1: reading(12),
                    cc2: reading(16),
                    d_plus: reading(20),
                    d_minus: reading(24),
                }))
            }
            0x43 => {
                let code = bytes[1];
                let message_type = match code {
                    0x01 => "GoodCRC",
                    0x02 => "Accept",
                    0x10 => "Source_Capabilities",
                    0x11 => "Request",
                    0x12 => "Source_Capabilities_Extended",
                    _ => "Reserved",
                };
                let mut children =
                    vec![PayloadNode::scalar("Message Type", format!("{code:08b}"), message_type)];
                if code == 0x11 {
                    // Context-dependent: a request decodes against the last
                    // capability message
                    let reference = context
                        .last_capability()
                        .map(|m| m.message_type.clone())
                        .unwrap_or_else(|| "none".to_string());
                    children.push(PayloadNode::scalar("Copy of PDO", "", reference));
                }
                let sop = match bytes[2] {
                    1 => "SOP'",
                    2 => "SOP''",
                    _ => "SOP",
                };
                Ok(DecodedFrame::Control(ControlFrame {
                    sop: sop.to_string(),
                    revision: Some("3.1".to_string()),
                    power_role: Some("Source".to_string()),
                    data_role: Some("DFP".to_string()),
                    message_type: message_type.to_string(),
                    payload: PayloadNode::group("pd", String::new(), children),
                }))
            }
            0xFF => Err(DecodeError::new("unrecognized report tag")),
            _ => Ok(DecodedFrame::Other),
        }
    }

    fn provides_capability(&self, message: &ControlFrame) -> bool {
        message.message_type == "Source_Capabilities"
    }

    fn provides_request(&self, message: &ControlFrame) -> bool {
        message.message_type == "Request"
    }

    fn provides_extended(&self, message: &ControlFrame) -> bool {
        message.message_type == "Source_Capabilities_Extended"
    }
}

/// What a scripted transport does once its script is exhausted.
pub enum ScriptEnd {
    /// Park forever, like a healthy device with no traffic.
    Hang,
    /// Fail fatally, like a device being unplugged.
    Fatal(&'static str),
}

/// Transport fixture that serves a fixed script of reads.
pub struct ScriptedTransport {
    script: VecDeque<Result<RawFrame, TransportError>>,
    end: ScriptEnd,
    gap: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<RawFrame, TransportError>>, end: ScriptEnd) -> Self {
        Self { script: script.into(), end, gap: None }
    }

    /// Sleep this long before every read, to pace the script in time.
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = Some(gap);
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn read_frame(&mut self) -> Result<RawFrame, TransportError> {
        if let Some(gap) = self.gap {
            tokio::time::sleep(gap).await;
        }
        match self.script.pop_front() {
            Some(result) => result,
            None => match &self.end {
                ScriptEnd::Hang => {
                    std::future::pending::<Result<RawFrame, TransportError>>().await
                }
                ScriptEnd::Fatal(reason) => Err(TransportError::Fatal((*reason).to_string())),
            },
        }
    }
}
