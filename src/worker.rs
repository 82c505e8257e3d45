//! Acquisition worker task
//!
//! The worker owns the device transport: it pulls raw frames, runs each
//! through the shared decode pipeline, and pushes derived events onto two
//! bounded channels. It must never block on a full channel - sends are
//! `try_send` with a drop-on-full policy, so sustained consumer saturation
//! loses events rather than stalling device reads and desynchronizing
//! telemetry timing.
//!
//! Pause semantics: telemetry is emitted unconditionally (suppressing it
//! would corrupt the plotted history), while paused control frames are
//! dropped before they reach the channel. The decode context still advances
//! for paused context-providing frames, so the next unpaused message decodes
//! against the correct context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::context::{DecodeContext, DecodedEvent, Provides, decode_step};
use crate::decoder::Decoder;
use crate::session::SessionConfig;
use crate::transport::Transport;
use crate::types::{DecodedMessage, TelemetrySample};

/// Event on the control channel.
#[derive(Debug, Clone)]
pub(crate) enum ControlEvent {
    /// A decoded control message, with the context slots it provided.
    Message { message: Arc<DecodedMessage>, provides: Provides },
    /// Sentinel: the transport failed fatally and the worker terminated.
    Disconnected { reason: String },
}

/// Event on the telemetry channel.
#[derive(Debug, Clone)]
pub(crate) struct TelemetryEvent {
    pub sample: TelemetrySample,
    /// Always set; consumed by the plotting sink.
    pub high_frequency: bool,
    /// Set at most once per readout interval; consumed by the readout sink.
    pub low_frequency: bool,
}

/// Handles returned by [`Worker::spawn`].
pub(crate) struct WorkerChannels {
    pub control: mpsc::Receiver<ControlEvent>,
    pub telemetry: mpsc::Receiver<TelemetryEvent>,
    pub cancel: CancellationToken,
    pub join: JoinHandle<()>,
}

/// Spawns and runs the acquisition task for one session.
pub(crate) struct Worker;

impl Worker {
    /// Spawn the acquisition task for the given transport and decoder.
    ///
    /// Returns the bounded event channels, the cancellation token that stops
    /// the task, and its join handle.
    pub fn spawn<T, D>(
        transport: T,
        decoder: Arc<D>,
        paused: Arc<AtomicBool>,
        config: &SessionConfig,
    ) -> WorkerChannels
    where
        T: Transport,
        D: Decoder,
    {
        let (control_tx, control_rx) = mpsc::channel(config.channel_capacity);
        let (telemetry_tx, telemetry_rx) = mpsc::channel(config.channel_capacity);
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let retry_delay = config.retry_delay;
        let readout_interval = config.readout_interval;
        let join = tokio::spawn(async move {
            capture_task(
                transport,
                decoder,
                paused,
                control_tx,
                telemetry_tx,
                task_cancel,
                retry_delay,
                readout_interval,
            )
            .await;
        });

        WorkerChannels { control: control_rx, telemetry: telemetry_rx, cancel, join }
    }
}

#[allow(clippy::too_many_arguments)]
async fn capture_task<T, D>(
    mut transport: T,
    decoder: Arc<D>,
    paused: Arc<AtomicBool>,
    control_tx: mpsc::Sender<ControlEvent>,
    telemetry_tx: mpsc::Sender<TelemetryEvent>,
    cancel: CancellationToken,
    retry_delay: std::time::Duration,
    readout_interval: std::time::Duration,
) where
    T: Transport,
    D: Decoder,
{
    info!("acquisition worker started");
    let mut context = DecodeContext::new();
    let mut frames = 0u64;
    let mut decode_failures = 0u64;
    let mut dropped = 0u64;
    let mut last_readout: Option<Instant> = None;

    loop {
        if cancel.is_cancelled() {
            debug!("acquisition worker cancelled");
            break;
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("acquisition worker cancelled during read");
                break;
            }
            result = transport.read_frame() => result,
        };

        match result {
            Ok(frame) => {
                frames += 1;
                let timestamp = Utc::now();

                match decode_step(decoder.as_ref(), &mut context, &frame, timestamp) {
                    Ok(Some(DecodedEvent::Telemetry(sample))) => {
                        let low_frequency = match last_readout {
                            Some(at) if at.elapsed() < readout_interval => false,
                            _ => {
                                last_readout = Some(Instant::now());
                                true
                            }
                        };
                        let event =
                            TelemetryEvent { sample, high_frequency: true, low_frequency };
                        match telemetry_tx.try_send(event) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                dropped += 1;
                                trace!(dropped, "telemetry channel full, sample dropped");
                            }
                            Err(TrySendError::Closed(_)) => {
                                debug!("telemetry receiver dropped, shutting down");
                                break;
                            }
                        }
                    }
                    Ok(Some(DecodedEvent::Control { message, provides })) => {
                        // Context already advanced above; a paused frame only
                        // skips the log.
                        if paused.load(Ordering::SeqCst) {
                            trace!(message_type = %message.message_type, "paused, control frame dropped");
                            continue;
                        }
                        match control_tx.try_send(ControlEvent::Message { message, provides }) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                dropped += 1;
                                trace!(dropped, "control channel full, message dropped");
                            }
                            Err(TrySendError::Closed(_)) => {
                                debug!("control receiver dropped, shutting down");
                                break;
                            }
                        }
                    }
                    Ok(None) => {
                        trace!("unclassified frame discarded");
                    }
                    Err(e) => {
                        decode_failures += 1;
                        trace!(%e, decode_failures, "frame skipped");
                    }
                }
            }
            Err(e) if e.is_fatal() => {
                error!(%e, "fatal transport error, stopping capture");
                // The read loop is over; delivering the sentinel takes
                // priority over the lossy policy that protects device reads.
                let sentinel = ControlEvent::Disconnected { reason: e.to_string() };
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = control_tx.send(sentinel) => {}
                }
                break;
            }
            Err(e) => {
                warn!(%e, "transient transport error, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("acquisition worker cancelled during retry delay");
                        break;
                    }
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        }
    }

    info!(frames, decode_failures, dropped, "acquisition worker ended");
}
