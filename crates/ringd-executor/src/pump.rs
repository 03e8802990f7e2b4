//! Periodic engine event loop pump.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{ExecutorError, ExecutorResult};
use crate::executor::SerializedExecutor;

/// Submits a poll task to the executor at a fixed interval.
///
/// At most one poll task is queued at a time; a tick that finds the previous
/// poll still waiting in the queue is skipped.
pub struct EventPump {
    _thread: thread::JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl EventPump {
    /// Start pumping `poll` through `executor` every `interval`.
    pub fn start<F>(executor: Arc<SerializedExecutor>, interval: Duration, poll: F) -> ExecutorResult<Self>
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let poll = Arc::new(poll);

        let thread = thread::Builder::new()
            .name("event-pump".into())
            .spawn(move || Self::pump_loop(executor, interval, poll, running_clone))
            .map_err(|e| ExecutorError::Spawn(format!("Failed to spawn event pump: {e}")))?;

        info!("Event pump started ({}ms interval)", interval.as_millis());
        Ok(Self {
            _thread: thread,
            running,
        })
    }

    fn pump_loop<F>(
        executor: Arc<SerializedExecutor>,
        interval: Duration,
        poll: Arc<F>,
        running: Arc<AtomicBool>,
    ) where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let queued = Arc::new(AtomicBool::new(false));
        let mut skipped = 0u64;

        loop {
            thread::sleep(interval);
            if !running.load(Ordering::Relaxed) || executor.is_shut_down() {
                break;
            }

            if queued.swap(true, Ordering::AcqRel) {
                skipped += 1;
                if skipped % 100 == 1 {
                    debug!("Event pump: previous poll still queued, skipping ({} so far)", skipped);
                }
                continue;
            }

            let poll = poll.clone();
            let queued = queued.clone();
            let running = running.clone();
            executor.submit("poll_events", move || {
                queued.store(false, Ordering::Release);
                if running.load(Ordering::Relaxed) {
                    poll()
                } else {
                    Ok(())
                }
            });
        }

        info!("Event pump loop ended");
    }

    /// Check if the pump is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop pumping. A poll already queued is skipped when it runs.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        info!("Event pump stopped");
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.stop();
    }
}
