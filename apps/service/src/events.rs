//! Outbound notifications.
//!
//! Events are fire-and-forget: state transitions emit them, nothing waits on
//! them. Observers subscribe through an [`EventSink`].
//!
//! Managers raise events while their state is locked, so they go through an
//! [`Outbox`] and reach the sink only once the lock is released. A sink may
//! therefore call straight back into the service.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Channel for daemon lifecycle events.
pub const DAEMON_CHANNEL: &str = "ringd://daemon";
/// Channel for render and capture events.
pub const VIDEO_CHANNEL: &str = "ringd://video";

/// Event sent to observers
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServiceEvent {
    /// The engine was started or stopped
    ConnectionChanged { connected: bool },
    /// Decoded frames of a stream are being rendered to its surface
    VideoStarted {
        call_id: String,
        width: u32,
        height: u32,
    },
    /// Rendering of a stream stopped and its window was released
    VideoStopped { call_id: String },
    /// Render or capture was requested but no usable surface exists yet
    StartRequested {
        call_id: Option<String>,
        no_surface: bool,
    },
    /// The local camera preview is running
    CaptureStarted {
        front_camera: bool,
        width: u32,
        height: u32,
    },
    /// The local camera was released
    CaptureStopped {
        front_camera: bool,
        width: u32,
        height: u32,
    },
    /// The local camera could not be opened or started
    CaptureFailed { device_id: u32, reason: String },
}

impl ServiceEvent {
    /// Channel the event belongs to.
    pub fn channel(&self) -> &'static str {
        match self {
            ServiceEvent::ConnectionChanged { .. } => DAEMON_CHANNEL,
            _ => VIDEO_CHANNEL,
        }
    }
}

/// Destination for outbound notifications.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ServiceEvent);
}

#[derive(Default)]
struct OutboxState {
    pending: VecDeque<ServiceEvent>,
    flushing: bool,
}

/// Events waiting to be handed to the sink, in the order they were raised.
pub struct Outbox {
    sink: Arc<dyn EventSink>,
    state: Mutex<OutboxState>,
}

impl Outbox {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            state: Mutex::new(OutboxState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OutboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, event: ServiceEvent) {
        self.lock().pending.push_back(event);
    }

    /// Deliver everything pending.
    ///
    /// A flush started from inside a sink returns at once; the outer flush
    /// picks up whatever the sink raised, after the events already queued.
    pub fn flush(&self) {
        {
            let mut state = self.lock();
            if state.flushing {
                return;
            }
            state.flushing = true;
        }
        let _reset = FlushReset(self);

        loop {
            let Some(event) = self.lock().pending.pop_front() else {
                break;
            };
            self.sink.emit(event);
        }
    }
}

struct FlushReset<'a>(&'a Outbox);

impl Drop for FlushReset<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.flushing = false;
        if thread::panicking() && !state.pending.is_empty() {
            error!("Sink panicked, {} events left pending", state.pending.len());
        }
    }
}

/// Fans events out to any number of subscribers.
pub struct BroadcastSink {
    tx: broadcast::Sender<ServiceEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: ServiceEvent) {
        if self.tx.send(event).is_err() {
            debug!("No subscribers for service event");
        }
    }
}

/// Logs each event as JSON.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ServiceEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(channel = event.channel(), "{payload}"),
            Err(e) => error!("Failed to serialize service event: {e}"),
        }
    }
}
