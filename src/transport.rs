//! Device transport boundary
//!
//! The physical sniffer link (HID reads, USB plumbing) is an external
//! collaborator; the engine consumes it through [`Transport`]. Opening and
//! closing the device are the caller's concern - a connected transport is
//! handed to [`crate::SessionController::connect`], and dropping it closes
//! the link.
//!
//! The blocking read call lives exclusively inside the acquisition worker;
//! no other component ever touches the transport.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::RawFrame;

/// Typed error the transport boundary returns.
///
/// Fatality is explicit here rather than inferred from error text: a
/// [`TransportError::Fatal`] terminates the worker and the session, a
/// [`TransportError::Transient`] is retried after a short delay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("unrecoverable device failure: {0}")]
    Fatal(String),

    #[error("transient device error: {0}")]
    Transient(String),
}

impl TransportError {
    /// Whether this error terminates the capture session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Fatal(_))
    }
}

/// Trait for sniffer device transports.
///
/// Providers handle their own timing internally: `read_frame` suspends until
/// the device produces the next 64-byte report. Reads shorter or longer than
/// 64 bytes must be normalized by the implementation (see
/// [`RawFrame::from_bytes`]).
#[async_trait]
pub trait Transport: Send + 'static {
    /// Read the next report from the device.
    async fn read_frame(&mut self) -> Result<RawFrame, TransportError>;
}
