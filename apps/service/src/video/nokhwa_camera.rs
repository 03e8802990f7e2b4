//! Desktop cameras through nokhwa.
//!
//! nokhwa cameras are opened and read on a dedicated `camera-preview` thread.
//! Frames are decoded to RGB, converted to I420 and passed to the installed
//! frame callback. Frames are only produced as I420 at exactly the
//! configured size; any other request fails to start.
//!
//! Desktop cameras don't report which way they face. The first device is
//! taken to be the built-in webcam facing the user and every other device as
//! facing away, all with an upright sensor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use tracing::{debug, error, info, warn};

use ringd_engine::{CaptureParams, DrawingSurface, PixelFormat};

use super::camera::{ErrorCallback, FrameCallback};
use super::convert::rgb_to_i420;
use super::{
    CameraDescriptor, CameraDevice, CameraFacing, CameraInfo, CameraProvider, FpsRange, PreviewConfig, VideoError,
    VideoResult,
};

/// Error code reported when the stream keeps failing to deliver frames.
pub const ERROR_STREAM_LOST: i32 = 2;

const DEFAULT_FPS: u32 = 30;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const MAX_FRAME_FAILURES: u32 = 30;
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

fn webcam_info(index: u32) -> CameraInfo {
    CameraInfo {
        facing: if index == 0 { CameraFacing::Front } else { CameraFacing::Back },
        orientation: 0,
    }
}

fn requested(width: u32, height: u32, fps: u32) -> RequestedFormat<'static> {
    let target = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps);
    RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(target))
}

/// [`CameraProvider`] over the cameras nokhwa can see.
#[derive(Debug, Default)]
pub struct NokhwaCameraProvider;

impl NokhwaCameraProvider {
    pub fn new() -> Self {
        Self
    }

    fn count(&self) -> usize {
        match nokhwa::query(ApiBackend::Auto) {
            Ok(devices) => devices.len(),
            Err(e) => {
                warn!("CAMERA: Failed to query cameras: {e}");
                0
            }
        }
    }
}

impl CameraProvider for NokhwaCameraProvider {
    fn devices(&self) -> VideoResult<Vec<CameraDescriptor>> {
        let devices = match nokhwa::query(ApiBackend::Auto) {
            Ok(devices) => devices,
            Err(e) => {
                warn!("CAMERA: Failed to query cameras: {e}");
                return Ok(Vec::new());
            }
        };

        Ok(devices
            .iter()
            .enumerate()
            .map(|(idx, dev)| CameraDescriptor {
                id: idx as u32,
                name: dev.human_name(),
                info: webcam_info(idx as u32),
            })
            .collect())
    }

    fn camera_info(&self, device_id: u32) -> VideoResult<CameraInfo> {
        if (device_id as usize) < self.count() {
            Ok(webcam_info(device_id))
        } else {
            Err(VideoError::CameraNotFound(device_id.to_string()))
        }
    }

    fn native_params(&self, device_id: u32) -> VideoResult<CaptureParams> {
        let camera = Camera::new(
            CameraIndex::Index(device_id),
            requested(DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_FPS),
        )
        .map_err(|e| VideoError::CameraOpen {
            device_id,
            reason: e.to_string(),
        })?;
        let format = camera.camera_format();
        Ok(CaptureParams::new(
            device_id,
            PixelFormat::I420,
            format.resolution().width(),
            format.resolution().height(),
            format.frame_rate(),
        ))
    }

    fn open(&self, device_id: u32) -> VideoResult<Box<dyn CameraDevice>> {
        let open_err = |reason: String| VideoError::CameraOpen { device_id, reason };

        // Probe the formats once here; the streaming handle is created on the
        // preview thread.
        let probe_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut probe = Camera::new(CameraIndex::Index(device_id), probe_format).map_err(|e| open_err(e.to_string()))?;
        let formats = probe.compatible_camera_formats().map_err(|e| open_err(e.to_string()))?;
        drop(probe);

        let mut fps_ranges: Vec<FpsRange> = Vec::new();
        for format in &formats {
            let range = FpsRange::new(format.frame_rate(), format.frame_rate());
            if !fps_ranges.contains(&range) {
                fps_ranges.push(range);
            }
        }
        info!("CAMERA: Opened device {} ({} formats)", device_id, formats.len());

        Ok(Box::new(NokhwaCameraDevice {
            device_id,
            fps_ranges,
            config: None,
            frame_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            preview: None,
        }))
    }
}

fn check_format(format: PixelFormat) -> VideoResult<()> {
    match format {
        PixelFormat::I420 => Ok(()),
        other => Err(VideoError::Unsupported(format!("{other:?} output, frames are delivered as I420"))),
    }
}

struct PreviewThread {
    handle: thread::JoinHandle<()>,
    running: Arc<AtomicBool>,
}

struct NokhwaCameraDevice {
    device_id: u32,
    fps_ranges: Vec<FpsRange>,
    config: Option<PreviewConfig>,
    frame_callback: Arc<Mutex<Option<FrameCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
    preview: Option<PreviewThread>,
}

impl CameraDevice for NokhwaCameraDevice {
    fn set_display_orientation(&mut self, degrees: u32) {
        // The UI draws the desktop preview itself
        debug!("CAMERA: Display orientation {} ignored", degrees);
    }

    fn set_preview_surface(&mut self, surface: &Arc<dyn DrawingSurface>) -> VideoResult<()> {
        if !surface.is_valid() {
            return Err(VideoError::PreviewSurface("surface is no longer valid".into()));
        }
        debug!("CAMERA: Preview bound to surface {:#x}", surface.native_handle());
        Ok(())
    }

    fn supported_fps_ranges(&self) -> Vec<FpsRange> {
        self.fps_ranges.clone()
    }

    fn configure(&mut self, config: &PreviewConfig) -> VideoResult<()> {
        self.config = Some(*config);
        check_format(config.format)
    }

    fn set_frame_callback(&mut self, callback: Option<FrameCallback>) {
        *self.frame_callback.lock().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    fn set_error_callback(&mut self, callback: Option<ErrorCallback>) {
        *self.error_callback.lock().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    fn start_preview(&mut self) -> VideoResult<()> {
        if self.preview.is_some() {
            return Ok(());
        }
        let config = self
            .config
            .ok_or_else(|| VideoError::StartPreview("device not configured".into()))?;
        check_format(config.format)?;

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker = PreviewWorker {
            device_id: self.device_id,
            config,
            running: running.clone(),
            frame_callback: self.frame_callback.clone(),
            error_callback: self.error_callback.clone(),
        };

        let handle = thread::Builder::new()
            .name("camera-preview".into())
            .spawn(move || worker.run(ready_tx))
            .map_err(|e| VideoError::StartPreview(format!("Failed to spawn preview thread: {e}")))?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => {
                self.preview = Some(PreviewThread { handle, running });
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(VideoError::StartPreview(reason))
            }
            Err(_) => {
                running.store(false, Ordering::Relaxed);
                Err(VideoError::StartPreview("camera did not open in time".into()))
            }
        }
    }

    fn stop_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            preview.running.store(false, Ordering::Relaxed);
            if preview.handle.join().is_err() {
                error!("CAMERA: Preview thread panicked");
            }
            info!("CAMERA: Preview stopped on device {}", self.device_id);
        }
    }

    fn release(mut self: Box<Self>) {
        self.stop_preview();
        debug!("CAMERA: Released device {}", self.device_id);
    }
}

impl Drop for NokhwaCameraDevice {
    fn drop(&mut self) {
        self.stop_preview();
    }
}

struct PreviewWorker {
    device_id: u32,
    config: PreviewConfig,
    running: Arc<AtomicBool>,
    frame_callback: Arc<Mutex<Option<FrameCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
}

impl PreviewWorker {
    fn run(self, ready: mpsc::Sender<Result<(), String>>) {
        let fps = self.config.fps.map(|range| range.max).unwrap_or(DEFAULT_FPS).max(1);
        let format = requested(self.config.width, self.config.height, fps);

        let mut camera = match Camera::new(CameraIndex::Index(self.device_id), format)
            .and_then(|mut camera| camera.open_stream().map(|_| camera))
        {
            Ok(camera) => camera,
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };

        let resolution = camera.resolution();
        let (width, height) = (resolution.width() as usize, resolution.height() as usize);
        // Frames are tagged with the configured size downstream
        if (width, height) != (self.config.width as usize, self.config.height as usize) {
            let _ = camera.stop_stream();
            let _ = ready.send(Err(format!(
                "requested {}x{}, device streams {}x{}",
                self.config.width, self.config.height, width, height
            )));
            return;
        }
        info!("CAMERA: Streaming {}x{} @ {} fps", width, height, fps);
        let _ = ready.send(Ok(()));

        let frame_interval = Duration::from_millis(1000 / fps as u64);
        let mut last_frame = Instant::now();
        let mut failures = 0u32;

        while self.running.load(Ordering::Relaxed) {
            let elapsed = last_frame.elapsed();
            if elapsed < frame_interval {
                thread::sleep(frame_interval - elapsed);
            }
            last_frame = Instant::now();

            let rgb = match camera.frame().and_then(|frame| frame.decode_image::<RgbFormat>()) {
                Ok(image) => image.into_raw(),
                Err(e) => {
                    failures += 1;
                    warn!("CAMERA: Failed to read frame: {e}");
                    if failures >= MAX_FRAME_FAILURES {
                        self.report_error(ERROR_STREAM_LOST);
                        break;
                    }
                    continue;
                }
            };
            failures = 0;

            let i420 = rgb_to_i420(&rgb, width, height);
            let mut callback = self.frame_callback.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(deliver) = callback.as_mut() {
                deliver(&i420);
            }
        }

        if let Err(e) = camera.stop_stream() {
            debug!("CAMERA: stop_stream failed: {e}");
        }
        info!("CAMERA: Preview loop ended");
    }

    fn report_error(&self, code: i32) {
        error!("CAMERA: Device {} lost its stream", self.device_id);
        if let Some(callback) = self.error_callback.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            callback(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> NokhwaCameraDevice {
        NokhwaCameraDevice {
            device_id: 0,
            fps_ranges: vec![FpsRange::new(30, 30)],
            config: None,
            frame_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            preview: None,
        }
    }

    #[test]
    fn test_non_i420_request_does_not_start() {
        let mut device = device();
        let config = PreviewConfig {
            format: PixelFormat::Nv21,
            width: 640,
            height: 480,
            fps: None,
        };

        assert!(matches!(device.configure(&config), Err(VideoError::Unsupported(_))));
        // Starting anyway must fail rather than stream I420 tagged as NV21
        assert!(matches!(device.start_preview(), Err(VideoError::Unsupported(_))));
        assert!(device.preview.is_none());
    }

    #[test]
    fn test_start_requires_configuration() {
        let mut device = device();
        assert!(matches!(device.start_preview(), Err(VideoError::StartPreview(_))));
    }

    #[test]
    fn test_first_device_faces_user() {
        assert_eq!(webcam_info(0).facing, CameraFacing::Front);
        assert_eq!(webcam_info(1).facing, CameraFacing::Back);
        assert_eq!(webcam_info(2).orientation, 0);
    }
}
