//! Surface registration, capture control and video queries.
//!
//! The UI owns drawing surfaces. It registers them here and the matching
//! state change is queued on the worker. Removals wait for the worker so the
//! native window is released before the UI destroys the surface.

use std::sync::Arc;

use ringd_engine::{CaptureParams, DrawingSurface};
use ringd_executor::ExecutorError;
use tracing::debug;

use crate::managers::engine_bridge::{try_with_video, with_video};
use crate::managers::video_manager::VideoManager;
use crate::video::{CameraDescriptor, CaptureSnapshot, StreamSnapshot};
use crate::{RingService, ServiceError, ServiceResult};

fn queue<F>(service: &RingService, task: &'static str, apply: F) -> ServiceResult<()>
where
    F: FnOnce(&mut VideoManager) + Send + 'static,
{
    if service.executor.is_shut_down() {
        return Err(ExecutorError::Rejected(task.to_string()).into());
    }
    let video = service.video.clone();
    service.executor.submit(task, move || {
        with_video(&video, apply);
        Ok(())
    });
    Ok(())
}

fn run<T, F>(service: &RingService, task: &'static str, apply: F) -> ServiceResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut VideoManager) -> T + Send + 'static,
{
    let video = service.video.clone();
    service
        .executor
        .submit_and_return(task, move || {
            try_with_video(&video, apply).ok_or_else(|| ServiceError::Reentrant(task.to_string()))
        })?
}

/// Register the surface remote video of `stream_id` is drawn into
pub fn add_video_surface(service: &RingService, stream_id: &str, surface: &Arc<dyn DrawingSurface>) -> ServiceResult<()> {
    service.surfaces.register_video(stream_id, surface);
    let id = stream_id.to_string();
    queue(service, "video_surface_added", move |video| video.surface_added(&id))
}

/// Unregister the surface of `stream_id`, returning once its window is released
pub fn remove_video_surface(service: &RingService, stream_id: &str) -> ServiceResult<()> {
    service.surfaces.unregister_video(stream_id);
    let id = stream_id.to_string();
    run(service, "video_surface_removed", move |video| video.surface_removed(&id))
}

/// Register the local camera preview surface
pub fn set_preview_surface(service: &RingService, surface: &Arc<dyn DrawingSurface>) -> ServiceResult<()> {
    service.surfaces.set_preview(surface);
    queue(service, "preview_surface_added", |video| video.preview_surface_added())
}

/// Unregister the preview surface, returning once the camera is released
pub fn remove_preview_surface(service: &RingService) -> ServiceResult<()> {
    service.surfaces.clear_preview();
    run(service, "preview_surface_removed", |video| video.preview_surface_removed())
}

pub fn start_capture(service: &RingService, params: CaptureParams) -> ServiceResult<()> {
    queue(service, "start_capture", move |video| video.start_capture(params))
}

pub fn stop_capture(service: &RingService) -> ServiceResult<()> {
    queue(service, "stop_capture", |video| video.stop_capture())
}

pub fn video_streams(service: &RingService) -> ServiceResult<Vec<StreamSnapshot>> {
    run(service, "video_streams", |video| video.streams())
}

pub fn capture_state(service: &RingService) -> ServiceResult<Option<CaptureSnapshot>> {
    run(service, "capture_state", |video| video.capture())
}

/// List available cameras
pub fn list_video_devices(service: &RingService) -> ServiceResult<Vec<CameraDescriptor>> {
    let devices = service.camera.devices()?;
    debug!("Found {} video devices", devices.len());
    Ok(devices)
}
