pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod managers;
pub mod video;

#[cfg(test)]
mod testing;

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use ringd_engine::NativeEngine;
use ringd_executor::SerializedExecutor;

pub use commands::calls::RingerMode;
pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use events::{BroadcastSink, EventSink, ServiceEvent, TracingSink};

use events::Outbox;
use managers::daemon_manager::{with_daemon, DaemonManager};
use managers::engine_bridge::with_video;
use managers::video_manager::{CameraFaultHandler, VideoManager};
use video::{CameraProvider, DisplayRotation, SurfaceRegistry};

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "ringd=debug,ringd_lib=debug,ringd_executor=debug,ringd_engine=debug";

/// Install the global tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .try_init();
}

/// Service state shared by all commands
pub struct RingService {
    pub(crate) executor: Arc<SerializedExecutor>,
    pub(crate) engine: Arc<dyn NativeEngine>,
    pub(crate) surfaces: Arc<SurfaceRegistry>,
    pub(crate) camera: Arc<dyn CameraProvider>,
    pub(crate) video: Arc<Mutex<VideoManager>>,
    pub(crate) daemon: Arc<Mutex<DaemonManager>>,
    config: ServiceConfig,
}

impl RingService {
    /// Build the service on the process-wide executor.
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        camera: Arc<dyn CameraProvider>,
        display: Arc<dyn DisplayRotation>,
        events: Arc<dyn EventSink>,
        config: ServiceConfig,
    ) -> ServiceResult<Self> {
        let executor = SerializedExecutor::global()?;
        Ok(Self::with_executor(executor, engine, camera, display, events, config))
    }

    pub fn with_executor(
        executor: Arc<SerializedExecutor>,
        engine: Arc<dyn NativeEngine>,
        camera: Arc<dyn CameraProvider>,
        display: Arc<dyn DisplayRotation>,
        events: Arc<dyn EventSink>,
        config: ServiceConfig,
    ) -> Self {
        let surfaces = Arc::new(SurfaceRegistry::new());
        let outbox = Arc::new(Outbox::new(events));

        let video = Arc::new_cyclic(|weak: &Weak<Mutex<VideoManager>>| {
            let on_fault = camera_fault_handler(executor.clone(), weak.clone());
            Mutex::new(VideoManager::new(
                engine.clone(),
                surfaces.clone(),
                camera.clone(),
                display,
                outbox.clone(),
                on_fault,
            ))
        });

        let daemon = Arc::new(Mutex::new(DaemonManager::new(
            engine.clone(),
            executor.clone(),
            video.clone(),
            outbox,
            config.poll_interval,
        )));

        info!(
            "Service ready on executor '{}' ({}ms poll interval)",
            executor.name(),
            config.poll_interval.as_millis()
        );

        Self {
            executor,
            engine,
            surfaces,
            camera,
            video,
            daemon,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Surfaces registered by the UI
    pub fn surfaces(&self) -> &Arc<SurfaceRegistry> {
        &self.surfaces
    }

    pub fn executor(&self) -> &Arc<SerializedExecutor> {
        &self.executor
    }
}

impl Drop for RingService {
    fn drop(&mut self) {
        let daemon = self.daemon.clone();
        let stopped = self.executor.submit_and_wait(
            "service_shutdown",
            move || {
                with_daemon(&daemon, DaemonManager::stop);
                Ok(())
            },
            Duration::from_secs(5),
        );
        if !stopped {
            warn!("Daemon did not stop cleanly on service drop");
        }
    }
}

/// Route camera errors back onto the worker, where the video manager checks
/// whether they still concern the active session.
fn camera_fault_handler(executor: Arc<SerializedExecutor>, video: Weak<Mutex<VideoManager>>) -> CameraFaultHandler {
    Arc::new(move |serial, code| {
        debug!("Camera session {} reported error {}", serial, code);
        let video = video.clone();
        executor.submit("camera_error", move || {
            if let Some(video) = video.upgrade() {
                with_video(&video, |video| video.on_camera_error(serial, code));
            }
            Ok(())
        });
    })
}
