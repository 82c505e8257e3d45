//! Session controller: lifecycle, drain loop, and the live data model
//!
//! The controller owns the connection lifecycle and the consumer side of the
//! pipeline. A spawned drain task polls both worker channels on a fixed tick,
//! non-blocking, and applies every event to the session's data model: the
//! append-only control-message log, the telemetry ring, and the quick-status
//! snapshot. Observers subscribe through watch channels; the log and ring are
//! read via snapshots, so readers never contend with the single writer.
//!
//! Connection confirmation is gated on the first drained event of either
//! channel: "transport opened" is not "data is flowing", and the session only
//! reports `Paused`/`Collecting` once the device has actually produced
//! something.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{DecodedEvent, Provides};
use crate::decoder::Decoder;
use crate::replay::{ExportRecord, ImportRecord, ReplayDecoder, ReplayOutcome};
use crate::ring::TelemetryRing;
use crate::session::{ConnectionState, SessionConfig};
use crate::transport::Transport;
use crate::types::{DecodedMessage, MarkerEvent, MarkerKind, TelemetrySample};
use crate::worker::{ControlEvent, TelemetryEvent, Worker};
use crate::{Result, SnifferError};

const LOCK_POISONED: &str = "session data lock poisoned";

/// Last-seen capability and request messages, for a one-line status summary.
#[derive(Debug, Clone, Default)]
pub struct QuickStatus {
    pub capability: Option<Arc<DecodedMessage>>,
    pub request: Option<Arc<DecodedMessage>>,
}

#[derive(Default)]
struct SessionData {
    log: Vec<Arc<DecodedMessage>>,
    status: QuickStatus,
}

struct Shared {
    data: RwLock<SessionData>,
    ring: RwLock<TelemetryRing>,
}

struct Observers {
    state: watch::Sender<ConnectionState>,
    log_len: watch::Sender<usize>,
    sample: watch::Sender<Option<TelemetrySample>>,
    readout: watch::Sender<Option<TelemetrySample>>,
    marker: watch::Sender<Option<MarkerEvent>>,
    fault: watch::Sender<Option<String>>,
}

impl Observers {
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = %state, to = %next, "connection state changed");
            *state = next;
            true
        });
    }

    fn reset_data_watches(&self) {
        self.log_len.send_replace(0);
        self.sample.send_replace(None);
        self.readout.send_replace(None);
        self.marker.send_replace(None);
    }
}

struct LiveLink {
    cancel: CancellationToken,
    worker: JoinHandle<()>,
    drain: JoinHandle<()>,
}

/// Owns one capture session: its worker, its channels, and its data model.
///
/// Exactly one session is live per connected device; reconnecting starts a
/// fresh session with empty context and buffers. The controller never
/// reconnects on its own - after a fatal disconnect, the caller clears the
/// session and initiates a new `connect`.
pub struct SessionController<D> {
    decoder: Arc<D>,
    config: SessionConfig,
    shared: Arc<Shared>,
    observers: Arc<Observers>,
    paused: Arc<AtomicBool>,
    autostart: Arc<AtomicBool>,
    import_mode: AtomicBool,
    live: Mutex<Option<LiveLink>>,
}

impl<D: Decoder> SessionController<D> {
    /// Create a controller with default tunables.
    pub fn new(decoder: D) -> Self {
        Self::with_config(decoder, SessionConfig::default())
    }

    pub fn with_config(decoder: D, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (log_len, _) = watch::channel(0);
        let (sample, _) = watch::channel(None);
        let (readout, _) = watch::channel(None);
        let (marker, _) = watch::channel(None);
        let (fault, _) = watch::channel(None);

        Self {
            decoder: Arc::new(decoder),
            config,
            shared: Arc::new(Shared {
                data: RwLock::new(SessionData::default()),
                ring: RwLock::new(TelemetryRing::new(config.ring_capacity, config.marker_policy)),
            }),
            observers: Arc::new(Observers { state, log_len, sample, readout, marker, fault }),
            paused: Arc::new(AtomicBool::new(true)),
            autostart: Arc::new(AtomicBool::new(false)),
            import_mode: AtomicBool::new(false),
            live: Mutex::new(None),
        }
    }

    /// Start a live capture session over a connected transport.
    ///
    /// Requires prior session data to have been cleared - the caller confirms
    /// the loss of the old session by calling [`clear`](Self::clear) first.
    /// The session starts `Connecting` and paused; it becomes `Paused` (or
    /// `Collecting`, if a resume was requested meanwhile) once the first
    /// event is drained from the worker.
    pub async fn connect<T: Transport>(&self, transport: T) -> Result<()> {
        let mut live = self.live.lock().await;

        // Reap a worker that already terminated on a fatal disconnect
        if live.as_ref().is_some_and(|link| link.worker.is_finished()) {
            if let Some(link) = live.take() {
                link.cancel.cancel();
                let _ = link.worker.await;
                let _ = link.drain.await;
            }
        }
        if live.is_some() {
            return Err(SnifferError::AlreadyConnected);
        }
        if self.has_data() || self.import_mode.load(Ordering::SeqCst) {
            return Err(SnifferError::SessionDataPresent { action: "connecting a device" });
        }

        self.paused.store(true, Ordering::SeqCst);
        self.autostart.store(false, Ordering::SeqCst);
        {
            let mut data = self.shared.data.write().expect(LOCK_POISONED);
            data.status = QuickStatus::default();
        }
        self.shared.ring.write().expect(LOCK_POISONED).clear();
        self.observers.reset_data_watches();
        self.observers.fault.send_replace(None);
        self.observers.set_state(ConnectionState::Connecting);

        let channels = Worker::spawn(
            transport,
            Arc::clone(&self.decoder),
            Arc::clone(&self.paused),
            &self.config,
        );
        let drain = tokio::spawn(drain_task(
            DrainContext {
                shared: Arc::clone(&self.shared),
                observers: Arc::clone(&self.observers),
                paused: Arc::clone(&self.paused),
                autostart: Arc::clone(&self.autostart),
                cancel: channels.cancel.clone(),
                drain_interval: self.config.drain_interval,
            },
            channels.control,
            channels.telemetry,
        ));

        *live = Some(LiveLink { cancel: channels.cancel, worker: channels.join, drain });
        info!("session connecting, awaiting first event");
        Ok(())
    }

    /// Stop the live session and transition to `Disconnected`.
    ///
    /// The worker is asked to stop; if it does not exit within
    /// [`SessionConfig::stop_timeout`] it is aborted and [`SnifferError::StopTimeout`]
    /// is returned. Captured data stays in place either way.
    pub async fn shutdown(&self) -> Result<()> {
        let mut live = self.live.lock().await;
        let Some(link) = live.take() else {
            return Err(SnifferError::NotConnected);
        };

        link.cancel.cancel();
        let _ = link.drain.await;

        let abort = link.worker.abort_handle();
        let stopped = tokio::time::timeout(self.config.stop_timeout, link.worker).await;

        self.paused.store(true, Ordering::SeqCst);
        self.autostart.store(false, Ordering::SeqCst);
        self.shared.data.write().expect(LOCK_POISONED).status = QuickStatus::default();
        self.observers.set_state(ConnectionState::Disconnected);

        match stopped {
            Ok(_) => {
                info!("session disconnected");
                Ok(())
            }
            Err(_) => {
                warn!(timeout = ?self.config.stop_timeout, "worker did not stop, aborting");
                abort.abort();
                Err(SnifferError::StopTimeout { timeout: self.config.stop_timeout })
            }
        }
    }

    /// Gate control traffic off the log.
    ///
    /// Telemetry keeps flowing regardless; a pending deferred resume is
    /// cancelled.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        let autostart = &self.autostart;
        self.observers.state.send_if_modified(|state| match state {
            ConnectionState::Collecting => {
                *state = ConnectionState::Paused;
                true
            }
            ConnectionState::Connecting => {
                autostart.store(false, Ordering::SeqCst);
                false
            }
            _ => false,
        });
        debug!("capture paused");
    }

    /// Start appending control traffic to the log.
    ///
    /// While still `Connecting`, the request is latched and applied the
    /// instant the first event confirms the connection. Imported data must be
    /// cleared before resuming live capture.
    pub fn resume(&self) -> Result<()> {
        if self.import_mode.load(Ordering::SeqCst) {
            return Err(SnifferError::ImportDataPresent);
        }

        enum Outcome {
            NotConnected,
            Deferred,
            Resumed,
        }
        let mut outcome = Outcome::NotConnected;
        let paused = &self.paused;
        let autostart = &self.autostart;
        self.observers.state.send_if_modified(|state| match state {
            ConnectionState::Connecting => {
                autostart.store(true, Ordering::SeqCst);
                outcome = Outcome::Deferred;
                false
            }
            ConnectionState::Paused => {
                paused.store(false, Ordering::SeqCst);
                *state = ConnectionState::Collecting;
                outcome = Outcome::Resumed;
                true
            }
            ConnectionState::Collecting => {
                outcome = Outcome::Resumed;
                false
            }
            ConnectionState::Disconnected => false,
        });

        match outcome {
            Outcome::NotConnected => Err(SnifferError::NotConnected),
            Outcome::Deferred => {
                info!("resume deferred until the connection is confirmed");
                Ok(())
            }
            Outcome::Resumed => {
                info!("collecting");
                Ok(())
            }
        }
    }

    /// Discard the log, the telemetry ring, and the quick-status snapshot.
    ///
    /// This is the caller's confirmation step before a reconnect or an
    /// import; it also leaves import mode.
    pub fn clear(&self) {
        {
            let mut data = self.shared.data.write().expect(LOCK_POISONED);
            data.log.clear();
            data.status = QuickStatus::default();
        }
        self.shared.ring.write().expect(LOCK_POISONED).clear();
        self.import_mode.store(false, Ordering::SeqCst);
        self.observers.reset_data_watches();
        info!("session data cleared");
    }

    /// Decode previously stored records into the session, offline.
    ///
    /// Rejected while collecting, and while prior session data is present.
    /// Every decodable control row is appended (pause gating does not apply
    /// to replay); malformed rows are counted and skipped. On success the
    /// session enters import mode, which blocks `resume` until cleared.
    pub fn import_records(&self, records: &[ImportRecord]) -> Result<ReplayOutcome> {
        if self.state().is_collecting() {
            return Err(SnifferError::ImportWhileCollecting);
        }
        if self.has_data() || self.import_mode.load(Ordering::SeqCst) {
            return Err(SnifferError::SessionDataPresent { action: "importing stored frames" });
        }

        info!(rows = records.len(), "importing stored frames");
        let mut replay = ReplayDecoder::new(Arc::clone(&self.decoder));
        let mut outcome = ReplayOutcome::default();

        for record in records {
            match replay.decode_record(record) {
                Ok(Some(DecodedEvent::Control { message, provides })) => {
                    apply_control(&self.shared, &self.observers, &message, provides);
                    outcome.decoded += 1;
                }
                Ok(Some(DecodedEvent::Telemetry(sample))) => {
                    apply_telemetry(&self.shared, &self.observers, sample, false);
                    outcome.skipped += 1;
                }
                Ok(None) => outcome.skipped += 1,
                Err(_) => outcome.failed += 1,
            }
        }

        self.import_mode.store(true, Ordering::SeqCst);
        info!(
            decoded = outcome.decoded,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "import finished"
        );
        Ok(outcome)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.observers.state.borrow()
    }

    /// Stream of lifecycle transitions; yields the current state immediately.
    pub fn state_updates(&self) -> impl Stream<Item = ConnectionState> + 'static {
        WatchStream::new(self.observers.state.subscribe())
    }

    /// Stream of high-frequency telemetry samples for plotting.
    pub fn sample_updates(&self) -> impl Stream<Item = TelemetrySample> + 'static {
        WatchStream::new(self.observers.sample.subscribe()).filter_map(|opt| async move { opt })
    }

    /// Stream of low-frequency samples for the human-readable readout.
    pub fn readout_updates(&self) -> impl Stream<Item = TelemetrySample> + 'static {
        WatchStream::new(self.observers.readout.subscribe()).filter_map(|opt| async move { opt })
    }

    /// Stream of marker events as they are recorded.
    pub fn marker_updates(&self) -> impl Stream<Item = MarkerEvent> + 'static {
        WatchStream::new(self.observers.marker.subscribe()).filter_map(|opt| async move { opt })
    }

    /// Watch the message-log length; changes on every append.
    pub fn log_len_updates(&self) -> watch::Receiver<usize> {
        self.observers.log_len.subscribe()
    }

    /// Human-readable cause of the last fatal disconnect, if any.
    pub fn fault(&self) -> Option<String> {
        self.observers.fault.borrow().clone()
    }

    /// Snapshot of the control-message log, oldest first. Indices are
    /// stable: position `i` is message `i + 1` for the session's lifetime.
    pub fn messages(&self) -> Vec<Arc<DecodedMessage>> {
        self.shared.data.read().expect(LOCK_POISONED).log.clone()
    }

    pub fn message_count(&self) -> usize {
        self.shared.data.read().expect(LOCK_POISONED).log.len()
    }

    /// Last-seen capability/request snapshot.
    pub fn quick_status(&self) -> QuickStatus {
        self.shared.data.read().expect(LOCK_POISONED).status.clone()
    }

    /// Snapshot of the telemetry series, oldest first.
    pub fn samples(&self) -> Vec<TelemetrySample> {
        self.shared.ring.read().expect(LOCK_POISONED).samples()
    }

    /// Snapshot of the retained markers, oldest first.
    pub fn markers(&self) -> Vec<MarkerEvent> {
        self.shared.ring.read().expect(LOCK_POISONED).markers()
    }

    /// Export rows for every logged control message.
    pub fn export_records(&self) -> Vec<ExportRecord> {
        let data = self.shared.data.read().expect(LOCK_POISONED);
        data.log
            .iter()
            .enumerate()
            .map(|(i, message)| ExportRecord::from_message(i + 1, message))
            .collect()
    }

    /// Whether the session currently holds imported (offline) data.
    pub fn is_import_mode(&self) -> bool {
        self.import_mode.load(Ordering::SeqCst)
    }

    fn has_data(&self) -> bool {
        !self.shared.data.read().expect(LOCK_POISONED).log.is_empty()
            || !self.shared.ring.read().expect(LOCK_POISONED).is_empty()
    }
}

impl<D> Drop for SessionController<D> {
    fn drop(&mut self) {
        if let Some(link) = self.live.get_mut().take() {
            debug!("dropping session controller, cancelling tasks");
            link.cancel.cancel();
        }
    }
}

struct DrainContext {
    shared: Arc<Shared>,
    observers: Arc<Observers>,
    paused: Arc<AtomicBool>,
    autostart: Arc<AtomicBool>,
    cancel: CancellationToken,
    drain_interval: Duration,
}

/// Consumer loop: drains both channels to exhaustion on every tick.
///
/// Never blocks on the channels; the only suspension points are the tick
/// itself and cancellation. Per-channel event order is preserved; no
/// cross-channel ordering is assumed.
async fn drain_task(
    ctx: DrainContext,
    mut control: mpsc::Receiver<ControlEvent>,
    mut telemetry: mpsc::Receiver<TelemetryEvent>,
) {
    debug!("drain task started");
    let mut ticker = tokio::time::interval(ctx.drain_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut confirmed = false;

    'outer: loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        while let Ok(event) = telemetry.try_recv() {
            if !confirmed {
                confirmed = true;
                confirm_connected(&ctx);
            }
            apply_telemetry(&ctx.shared, &ctx.observers, event.sample, event.low_frequency);
        }

        loop {
            match control.try_recv() {
                Ok(ControlEvent::Message { message, provides }) => {
                    if !confirmed {
                        confirmed = true;
                        confirm_connected(&ctx);
                    }
                    apply_control(&ctx.shared, &ctx.observers, &message, provides);
                }
                Ok(ControlEvent::Disconnected { reason }) => {
                    warn!(%reason, "device disconnected");
                    ctx.paused.store(true, Ordering::SeqCst);
                    ctx.autostart.store(false, Ordering::SeqCst);
                    ctx.shared.data.write().expect(LOCK_POISONED).status = QuickStatus::default();
                    ctx.observers.fault.send_replace(Some(reason));
                    ctx.observers.set_state(ConnectionState::Disconnected);
                    break 'outer;
                }
                Err(_) => break,
            }
        }
    }

    debug!("drain task ended");
}

fn confirm_connected(ctx: &DrainContext) {
    ctx.observers.state.send_if_modified(|state| {
        if *state != ConnectionState::Connecting {
            return false;
        }
        *state = if ctx.autostart.swap(false, Ordering::SeqCst) {
            ctx.paused.store(false, Ordering::SeqCst);
            ConnectionState::Collecting
        } else {
            ConnectionState::Paused
        };
        true
    });
    info!(state = %*ctx.observers.state.borrow(), "first event drained, device confirmed");
}

fn apply_telemetry(
    shared: &Shared,
    observers: &Observers,
    sample: TelemetrySample,
    low_frequency: bool,
) {
    let rebased = shared.ring.write().expect(LOCK_POISONED).push(sample);
    observers.sample.send_replace(Some(rebased));
    if low_frequency {
        observers.readout.send_replace(Some(rebased));
    }
}

fn apply_control(
    shared: &Shared,
    observers: &Observers,
    message: &Arc<DecodedMessage>,
    provides: Provides,
) {
    let log_len = {
        let mut data = shared.data.write().expect(LOCK_POISONED);
        data.log.push(Arc::clone(message));
        if provides.capability {
            data.status.capability = Some(Arc::clone(message));
        }
        if provides.request {
            data.status.request = Some(Arc::clone(message));
        }
        data.log.len()
    };
    observers.log_len.send_replace(log_len);

    if provides.capability {
        push_marker(shared, observers, MarkerKind::Capability, message);
    }
    if provides.request {
        push_marker(shared, observers, MarkerKind::Request, message);
    }
}

fn push_marker(
    shared: &Shared,
    observers: &Observers,
    kind: MarkerKind,
    message: &Arc<DecodedMessage>,
) {
    let marker = shared.ring.write().expect(LOCK_POISONED).add_marker(kind, message.timestamp);
    if let Some(marker) = marker {
        observers.marker.send_replace(Some(marker));
    }
}
