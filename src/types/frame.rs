//! Raw report frames as produced by the sniffer transport

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Result, SnifferError};

/// Length of every report the device produces, in bytes.
pub const FRAME_LEN: usize = 64;

/// A raw 64-byte report frame.
///
/// This is the fundamental data unit that flows through the system: the
/// transport produces one per device read, and import parsing produces one per
/// stored record. Construction normalizes any input to exactly [`FRAME_LEN`]
/// bytes - shorter input is zero-padded at the tail, longer input is
/// truncated. Immutable once produced.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawFrame {
    bytes: [u8; FRAME_LEN],
}

impl RawFrame {
    /// Build a frame from arbitrary-length bytes, normalizing to 64 bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        let len = data.len().min(FRAME_LEN);
        bytes[..len].copy_from_slice(&data[..len]);
        Self { bytes }
    }

    /// Parse a frame from a hex payload as found in stored capture records.
    ///
    /// Accepts an optional `0x`/`0X` prefix, embedded spaces, upper or lower
    /// case, and odd-length input (left-padded with a single zero nibble).
    /// The decoded bytes are then normalized like [`RawFrame::from_bytes`].
    pub fn from_hex(input: &str) -> Result<Self> {
        let compact: String = input.trim().chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let digits = compact
            .strip_prefix("0x")
            .or_else(|| compact.strip_prefix("0X"))
            .unwrap_or(compact.as_str());
        if digits.is_empty() {
            return Err(SnifferError::payload("empty hex payload"));
        }

        let padded;
        let digits = if digits.len() % 2 == 1 {
            padded = format!("0{digits}");
            padded.as_str()
        } else {
            digits
        };

        let mut data = Vec::with_capacity(digits.len() / 2);
        for pair in digits.as_bytes().chunks(2) {
            let pair = std::str::from_utf8(pair)
                .map_err(|_| SnifferError::payload("non-ascii hex payload"))?;
            let byte = u8::from_str_radix(pair, 16).map_err(|_| {
                SnifferError::payload(format!("invalid hex digits {pair:?} in payload"))
            })?;
            data.push(byte);
        }

        Ok(Self::from_bytes(&data))
    }

    /// Borrow the normalized frame contents.
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// Render the frame as contiguous uppercase hex (128 digits).
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(FRAME_LEN * 2);
        for byte in &self.bytes {
            out.push_str(&format!("{byte:02X}"));
        }
        out
    }
}

impl Default for RawFrame {
    fn default() -> Self {
        Self { bytes: [0u8; FRAME_LEN] }
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RawFrame").field(&self.to_hex()).finish()
    }
}

impl Serialize for RawFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RawFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        RawFrame::from_hex(&text).map_err(serde::de::Error::custom)
    }
}
