//! Engine callback handler.
//!
//! The engine calls back from its own threads. Every callback is turned into
//! a task on the executor so video state is only touched on the worker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

use tracing::{debug, info};

use ringd_engine::{CaptureParams, EngineCallbacks};
use ringd_executor::SerializedExecutor;

use super::video_manager::VideoManager;

/// Lock the video state, recovering it if a previous task panicked while
/// holding the lock.
pub fn lock_video(video: &Mutex<VideoManager>) -> MutexGuard<'_, VideoManager> {
    video.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply `f` to the video state, then deliver the events it raised once the
/// lock is released.
pub fn with_video<T>(video: &Mutex<VideoManager>, f: impl FnOnce(&mut VideoManager) -> T) -> T {
    let mut guard = lock_video(video);
    let value = f(&mut guard);
    let outbox = guard.outbox().clone();
    drop(guard);
    outbox.flush();
    value
}

/// Like [`with_video`], but `None` instead of blocking when the state is
/// already locked. On the worker that means the caller is nested inside a
/// video operation and waiting would never end.
pub fn try_with_video<T>(video: &Mutex<VideoManager>, f: impl FnOnce(&mut VideoManager) -> T) -> Option<T> {
    let mut guard = match video.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return None,
    };
    let value = f(&mut guard);
    let outbox = guard.outbox().clone();
    drop(guard);
    outbox.flush();
    Some(value)
}

/// Forwards engine callbacks to the [`VideoManager`] via the executor.
pub struct EngineBridge {
    executor: Arc<SerializedExecutor>,
    /// Weak so a bridge still held by the engine does not keep video state
    /// alive after the service is gone
    video: Weak<Mutex<VideoManager>>,
}

impl EngineBridge {
    pub fn new(executor: Arc<SerializedExecutor>, video: &Arc<Mutex<VideoManager>>) -> Self {
        Self {
            executor,
            video: Arc::downgrade(video),
        }
    }

    fn dispatch<F>(&self, task: &'static str, apply: F)
    where
        F: FnOnce(&mut VideoManager) + Send + 'static,
    {
        let video = self.video.clone();
        self.executor.submit(task, move || {
            match video.upgrade() {
                Some(video) => with_video(&video, apply),
                None => debug!("Video state dropped, ignoring {}", task),
            }
            Ok(())
        });
    }
}

impl EngineCallbacks for EngineBridge {
    fn on_decoding_started(&self, stream_id: &str, shm_path: &str, width: u32, height: u32, is_mixer: bool) {
        let id = stream_id.to_string();
        let path = shm_path.to_string();
        self.dispatch("decoding_started", move |video| {
            video.decoding_started(&id, &path, width, height, is_mixer)
        });
    }

    fn on_decoding_stopped(&self, stream_id: &str) {
        let id = stream_id.to_string();
        self.dispatch("decoding_stopped", move |video| video.decoding_stopped(&id));
    }

    fn on_start_capture(&self, params: CaptureParams) {
        info!("Engine requested capture on device {}", params.device_id);
        self.dispatch("start_capture", move |video| video.start_capture(params));
    }

    fn on_stop_capture(&self) {
        self.dispatch("stop_capture", |video| video.stop_capture());
    }
}
