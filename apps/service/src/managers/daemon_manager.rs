//! Engine lifecycle.
//!
//! Starting the daemon initializes the engine with an [`EngineBridge`] and
//! starts the event pump; stopping it releases every video resource before
//! the engine is torn down. Both run on the executor worker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use tracing::{debug, error, info};

use ringd_engine::{EngineError, EngineResult, NativeEngine};
use ringd_executor::{EventPump, SerializedExecutor};

use super::engine_bridge::{lock_video, EngineBridge};
use super::video_manager::VideoManager;
use crate::error::ServiceResult;
use crate::events::{Outbox, ServiceEvent};

pub fn lock_daemon(daemon: &Mutex<DaemonManager>) -> MutexGuard<'_, DaemonManager> {
    daemon.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply `f` to the daemon, delivering raised events after the lock is released.
pub fn with_daemon<T>(daemon: &Mutex<DaemonManager>, f: impl FnOnce(&mut DaemonManager) -> T) -> T {
    let mut guard = lock_daemon(daemon);
    let value = f(&mut guard);
    let outbox = guard.events.clone();
    drop(guard);
    outbox.flush();
    value
}

/// [`with_daemon`] for commands that may be nested inside a daemon operation:
/// `None` instead of waiting on a lock the worker already holds.
pub fn try_with_daemon<T>(daemon: &Mutex<DaemonManager>, f: impl FnOnce(&mut DaemonManager) -> T) -> Option<T> {
    let mut guard = match daemon.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return None,
    };
    let value = f(&mut guard);
    let outbox = guard.events.clone();
    drop(guard);
    outbox.flush();
    Some(value)
}

pub struct DaemonManager {
    engine: Arc<dyn NativeEngine>,
    executor: Arc<SerializedExecutor>,
    video: Arc<Mutex<VideoManager>>,
    events: Arc<Outbox>,
    poll_interval: Duration,
    /// Present while the engine is initialized
    pump: Option<EventPump>,
}

impl DaemonManager {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        executor: Arc<SerializedExecutor>,
        video: Arc<Mutex<VideoManager>>,
        events: Arc<Outbox>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            executor,
            video,
            events,
            poll_interval,
            pump: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.pump.is_some()
    }

    /// Fail with [`EngineError::NotStarted`] unless the engine is running.
    pub fn ensure_started(&self) -> EngineResult<()> {
        if self.is_started() {
            Ok(())
        } else {
            Err(EngineError::NotStarted)
        }
    }

    /// Initialize the engine and start pumping its event loop.
    pub fn start(&mut self) -> ServiceResult<()> {
        if self.is_started() {
            debug!("Daemon already started");
            return Ok(());
        }

        info!("Starting daemon");
        let bridge = Arc::new(EngineBridge::new(self.executor.clone(), &self.video));
        if let Err(e) = self.engine.init(bridge) {
            error!("Engine init failed: {e}");
            return Err(e.into());
        }

        let engine = self.engine.clone();
        let pump = EventPump::start(self.executor.clone(), self.poll_interval, move || {
            engine.poll_events();
            Ok(())
        });
        match pump {
            Ok(pump) => self.pump = Some(pump),
            Err(e) => {
                error!("Failed to start event pump: {e}");
                self.engine.fini();
                return Err(e.into());
            }
        }

        info!("Daemon started");
        self.events.push(ServiceEvent::ConnectionChanged { connected: true });
        Ok(())
    }

    /// Release video resources and tear the engine down.
    pub fn stop(&mut self) {
        let Some(pump) = self.pump.take() else {
            debug!("Daemon not running");
            return;
        };

        info!("Stopping daemon");
        pump.stop();
        lock_video(&self.video).release_all();
        self.engine.fini();

        info!("Daemon stopped");
        self.events.push(ServiceEvent::ConnectionChanged { connected: false });
    }
}

impl Drop for DaemonManager {
    fn drop(&mut self) {
        self.stop();
        self.events.flush();
    }
}
