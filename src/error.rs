//! Error types for capture and decode.
//!
//! All failures surface as [`SnifferError`]. The variants map onto the four
//! classes the engine distinguishes at runtime:
//!
//! - **Transport failures** carry a fatality flag: fatal failures terminate
//!   the acquisition worker, transient ones are retried in place.
//! - **Per-frame failures** (`Decode`, `Payload`) never abort a capture or a
//!   replay run; they are counted and the offending frame is skipped.
//! - **Operator refusals** (`AlreadyConnected`, `SessionDataPresent`, ...)
//!   reject an invalid request synchronously without mutating any state.
//! - **Shutdown failures** (`StopTimeout`) report that a worker had to be
//!   force-terminated.
//!
//! ```rust
//! use pdtap::SnifferError;
//!
//! let error = SnifferError::transport("device unplugged", true);
//! assert!(error.is_fatal());
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::decoder::DecodeError;
use crate::transport::TransportError;

/// Result type alias for capture operations.
pub type Result<T, E = SnifferError> = std::result::Result<T, E>;

/// Main error type for capture and replay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SnifferError {
    #[error("transport failure: {reason}")]
    Transport { reason: String, fatal: bool },

    #[error("frame decode failed: {details}")]
    Decode { details: String },

    #[error("invalid import payload: {details}")]
    Payload { details: String },

    #[error("a capture session is already active")]
    AlreadyConnected,

    #[error("no device connected")]
    NotConnected,

    #[error("prior session data present; clear the session before {action}")]
    SessionDataPresent { action: &'static str },

    #[error("imported data present; clear the session before resuming live capture")]
    ImportDataPresent,

    #[error("cannot import stored frames while collecting; pause the capture first")]
    ImportWhileCollecting,

    #[error("acquisition worker did not stop within {timeout:?} and was aborted")]
    StopTimeout { timeout: Duration },
}

impl SnifferError {
    /// Returns whether this error terminates the session it occurred in.
    ///
    /// Per-frame and operator errors are never fatal; only an unrecoverable
    /// transport failure or a worker that had to be aborted is.
    pub fn is_fatal(&self) -> bool {
        match self {
            SnifferError::Transport { fatal, .. } => *fatal,
            SnifferError::StopTimeout { .. } => true,
            _ => false,
        }
    }

    /// Helper constructor for transport errors.
    pub fn transport(reason: impl Into<String>, fatal: bool) -> Self {
        SnifferError::Transport { reason: reason.into(), fatal }
    }

    /// Helper constructor for per-frame decode failures.
    pub fn decode_failed(details: impl Into<String>) -> Self {
        SnifferError::Decode { details: details.into() }
    }

    /// Helper constructor for malformed import payloads.
    pub fn payload(details: impl Into<String>) -> Self {
        SnifferError::Payload { details: details.into() }
    }
}

impl From<TransportError> for SnifferError {
    fn from(err: TransportError) -> Self {
        let fatal = err.is_fatal();
        SnifferError::Transport { reason: err.to_string(), fatal }
    }
}

impl From<DecodeError> for SnifferError {
    fn from(err: DecodeError) -> Self {
        SnifferError::Decode { details: err.to_string() }
    }
}
