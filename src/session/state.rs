//! Connection lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle state of a capture session.
///
/// Transitions:
/// `Disconnected → Connecting → Paused ⇄ Collecting → Disconnected`.
///
/// `Connecting` means the transport opened but no data has been drained yet;
/// the session only announces itself connected once the first event arrives
/// from the worker, which distinguishes "transport opened" from "data is
/// actually flowing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    /// Transport opened, awaiting the first drained event.
    Connecting,
    /// Connected; control traffic is gated off the log.
    Paused,
    /// Connected and appending control traffic to the log.
    Collecting,
}

impl ConnectionState {
    /// Whether the first event has been drained and the device confirmed.
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Paused | ConnectionState::Collecting)
    }

    pub fn is_collecting(self) -> bool {
        self == ConnectionState::Collecting
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Paused => "paused",
            ConnectionState::Collecting => "collecting",
        };
        f.write_str(name)
    }
}
