//! Video resource coordinator.
//!
//! Pairs decode streams announced by the engine with drawing surfaces
//! registered by the UI, and owns the local camera session. All methods run
//! on the executor worker; the UI and the engine reach them by submitting
//! tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use ringd_engine::{CaptureParams, DrawingSurface, NativeEngine};

use crate::events::{Outbox, ServiceEvent};
use crate::video::capture::{select_fps_range, CaptureSession};
use crate::video::orientation::{display_orientation, frame_rotation};
use crate::video::{
    CameraProvider, CaptureSnapshot, DisplayRotation, FrameForwarder, PreviewConfig, StreamResource, StreamSnapshot,
    SurfaceRegistry, VideoResult,
};

/// Invoked from a camera's error callback with the session serial and the
/// device error code. Runs on whatever thread the camera reports from.
pub type CameraFaultHandler = Arc<dyn Fn(u64, i32) + Send + Sync>;

/// Owns every decode window and the capture device.
pub struct VideoManager {
    engine: Arc<dyn NativeEngine>,
    surfaces: Arc<SurfaceRegistry>,
    camera: Arc<dyn CameraProvider>,
    display: Arc<dyn DisplayRotation>,
    events: Arc<Outbox>,
    on_camera_fault: CameraFaultHandler,
    /// Decode resources keyed by stream id
    streams: HashMap<String, StreamResource>,
    capture: Option<CaptureSession>,
    /// Capture requested while it could not run; retried when a preview
    /// surface appears
    pending_capture: Option<CaptureParams>,
    next_serial: u64,
}

impl VideoManager {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        surfaces: Arc<SurfaceRegistry>,
        camera: Arc<dyn CameraProvider>,
        display: Arc<dyn DisplayRotation>,
        events: Arc<Outbox>,
        on_camera_fault: CameraFaultHandler,
    ) -> Self {
        Self {
            engine,
            surfaces,
            camera,
            display,
            events,
            on_camera_fault,
            streams: HashMap::new(),
            capture: None,
            pending_capture: None,
            next_serial: 0,
        }
    }

    /// Queue events are raised into; flushed by whoever releases the lock.
    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.events
    }

    // ─── Decode ──────────────────────────────────────────────────────────

    /// The engine began decoding a stream.
    pub fn decoding_started(&mut self, id: &str, shm_path: &str, width: u32, height: u32, is_mixer: bool) {
        info!(
            "decodingStarted {} {} {}x{} mixer={}",
            id, shm_path, width, height, is_mixer
        );

        if let Some(mut previous) = self.streams.remove(id) {
            warn!("Stream {} restarted decoding, dropping previous resource", id);
            self.stop_video(&mut previous);
        }

        let mut input = StreamResource::new(id, shm_path, width, height, is_mixer);
        match self.surfaces.video_surface(id) {
            Some(surface) => self.start_video(&mut input, surface.as_ref()),
            None => debug!("No surface for stream {} yet", id),
        }
        self.streams.insert(id.to_string(), input);
    }

    /// The engine stopped decoding a stream.
    pub fn decoding_stopped(&mut self, id: &str) {
        info!("decodingStopped {}", id);
        match self.streams.remove(id) {
            Some(mut input) => self.stop_video(&mut input),
            None => debug!("decodingStopped for unknown stream {}", id),
        }
    }

    /// The UI registered a surface for stream `id`.
    pub fn surface_added(&mut self, id: &str) {
        let Some(surface) = self.surfaces.video_surface(id) else {
            debug!("Surface for {} is gone or invalid", id);
            return;
        };

        let Some(mut input) = self.streams.remove(id) else {
            debug!("Surface added for {} before decoding started", id);
            return;
        };
        if input.window.is_none() {
            self.start_video(&mut input, surface.as_ref());
        }
        self.streams.insert(id.to_string(), input);
    }

    /// The UI is tearing down the surface for stream `id`.
    pub fn surface_removed(&mut self, id: &str) {
        if let Some(mut input) = self.streams.remove(id) {
            self.stop_video(&mut input);
            self.streams.insert(id.to_string(), input);
        }
    }

    fn start_video(&self, input: &mut StreamResource, surface: &dyn DrawingSurface) {
        if input.window.is_some() {
            debug!("Stream {} already rendering", input.id);
            return;
        }
        info!("startVideo {} {}x{}", input.id, input.width, input.height);

        let Some(window) = self.engine.acquire_window(surface) else {
            warn!("No native window for stream {}", input.id);
            self.events.push(ServiceEvent::StartRequested {
                call_id: Some(input.id.clone()),
                no_surface: true,
            });
            return;
        };

        self.engine.set_window_geometry(&window, input.width, input.height);
        self.engine.register_frame_sink(&input.id, &window);
        input.window = Some(window);
        input.started_at = Some(chrono::Utc::now().to_rfc3339());

        self.events.push(ServiceEvent::VideoStarted {
            call_id: input.id.clone(),
            width: input.width,
            height: input.height,
        });
    }

    fn stop_video(&self, input: &mut StreamResource) {
        let Some(window) = input.window.take() else {
            return;
        };
        info!("stopVideo {}", input.id);

        self.engine.unregister_frame_sink(&input.id, &window);
        self.engine.release_window(window);
        input.started_at = None;

        self.events.push(ServiceEvent::VideoStopped {
            call_id: input.id.clone(),
        });
    }

    // ─── Capture ─────────────────────────────────────────────────────────

    /// Open the requested camera and start feeding frames to the engine.
    /// Any running session is torn down first.
    pub fn start_capture(&mut self, params: CaptureParams) {
        self.close_capture();
        self.pending_capture = None;

        let Some(surface) = self.surfaces.preview_surface() else {
            warn!("Can't start capture: no preview surface");
            self.pending_capture = Some(params);
            self.events.push(ServiceEvent::StartRequested {
                call_id: None,
                no_surface: true,
            });
            return;
        };

        info!(
            "startCapture device {} {}x{} @{}fps ({:?}, {} byte frames)",
            params.device_id,
            params.width,
            params.height,
            params.rate,
            params.format,
            params.format.frame_size(params.width, params.height)
        );

        match self.open_capture(params, &surface) {
            Ok(session) => {
                let (width, height) = session.output_size();
                let front_camera = session.is_front();
                self.capture = Some(session);
                self.events.push(ServiceEvent::CaptureStarted {
                    front_camera,
                    width,
                    height,
                });
            }
            Err(e) => {
                error!("Capture on device {} failed: {}", params.device_id, e);
                self.pending_capture = Some(params);
                self.events.push(ServiceEvent::CaptureFailed {
                    device_id: params.device_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn open_capture(&mut self, params: CaptureParams, surface: &Arc<dyn DrawingSurface>) -> VideoResult<CaptureSession> {
        let info = self.camera.camera_info(params.device_id)?;
        let mut device = self.camera.open(params.device_id)?;

        let display = self.display.rotation_degrees();
        device.set_display_orientation(display_orientation(info.facing, info.orientation, display));
        let rotation = frame_rotation(info.facing, info.orientation, display);

        if let Err(e) = device.set_preview_surface(surface) {
            device.release();
            return Err(e);
        }

        let fps = select_fps_range(&device.supported_fps_ranges(), params.rate);
        if fps.is_none() {
            warn!("No frame-rate range contains {}fps, keeping device default", params.rate);
        }
        let config = PreviewConfig {
            format: params.format,
            width: params.width,
            height: params.height,
            fps,
        };
        if let Err(e) = device.configure(&config) {
            warn!("Error while setting preview parameters: {}", e);
        }

        self.next_serial += 1;
        let serial = self.next_serial;

        let mut forwarder = FrameForwarder::new(self.engine.clone(), params.width, params.height, rotation);
        device.set_frame_callback(Some(Box::new(move |data: &[u8]| forwarder.deliver(data))));
        let fault = self.on_camera_fault.clone();
        device.set_error_callback(Some(Box::new(move |code: i32| fault(serial, code))));

        if let Err(e) = device.start_preview() {
            device.set_frame_callback(None);
            device.set_error_callback(None);
            device.release();
            return Err(e);
        }

        debug!("Camera session {} started, frame rotation {}", serial, rotation);
        Ok(CaptureSession::new(params, info, rotation, serial, device))
    }

    /// Release the active session, if any, and report it.
    fn close_capture(&mut self) -> Option<CaptureParams> {
        let session = self.capture.take()?;
        let front_camera = session.is_front();
        let params = session.close();
        self.events.push(ServiceEvent::CaptureStopped {
            front_camera,
            width: params.width,
            height: params.height,
        });
        Some(params)
    }

    /// Stop capturing and forget any pending request.
    pub fn stop_capture(&mut self) {
        info!("stopCapture");
        self.close_capture();
        self.pending_capture = None;
    }

    /// A preview surface appeared: start the pending request, or move the
    /// running session onto the new surface.
    pub fn preview_surface_added(&mut self) {
        let params = self
            .pending_capture
            .take()
            .or_else(|| self.capture.as_ref().map(|session| session.params));
        match params {
            Some(params) => self.start_capture(params),
            None => debug!("Preview surface added, nothing to capture"),
        }
    }

    /// The preview surface is going away. The camera is released but the
    /// request is kept so capture resumes on the next surface.
    pub fn preview_surface_removed(&mut self) {
        if let Some(params) = self.close_capture() {
            info!("Preview surface removed, capture on device {} suspended", params.device_id);
            self.pending_capture = Some(params);
        }
    }

    /// Error reported by the camera identified by `serial`.
    pub fn on_camera_error(&mut self, serial: u64, code: i32) {
        match &self.capture {
            Some(session) if session.serial == serial => {
                error!("Camera error {} on device {}, releasing", code, session.params.device_id);
                self.close_capture();
            }
            _ => debug!("Ignoring camera error {} from stale session {}", code, serial),
        }
    }

    /// Release every window and the camera. Used when the engine shuts down.
    pub fn release_all(&mut self) {
        let mut streams: Vec<StreamResource> = self.streams.drain().map(|(_, input)| input).collect();
        for input in &mut streams {
            self.stop_video(input);
        }
        self.stop_capture();
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Known streams, ordered by id.
    pub fn streams(&self) -> Vec<StreamSnapshot> {
        let mut streams: Vec<StreamSnapshot> = self.streams.values().map(StreamResource::snapshot).collect();
        streams.sort_by(|a, b| a.id.cmp(&b.id));
        streams
    }

    pub fn capture(&self) -> Option<CaptureSnapshot> {
        self.capture.as_ref().map(CaptureSession::snapshot)
    }

    pub fn pending_capture(&self) -> Option<CaptureParams> {
        self.pending_capture
    }

    pub fn is_rendering(&self, id: &str) -> bool {
        self.streams.get(id).is_some_and(StreamResource::is_rendering)
    }
}

impl Drop for VideoManager {
    fn drop(&mut self) {
        if !self.streams.is_empty() || self.capture.is_some() {
            self.release_all();
            self.events.flush();
        }
    }
}
