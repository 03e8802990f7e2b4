//! Recording test doubles for the engine, camera, surfaces and event sink.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ringd_engine::{
    CaptureParams, DrawingSurface, EngineCallbacks, EngineError, EngineResult, FrameBuffer, NativeEngine,
    NativeVideo, NativeWindow, PixelFormat,
};
use ringd_executor::SerializedExecutor;

use crate::events::{EventSink, ServiceEvent};
use crate::video::camera::{ErrorCallback, FrameCallback};
use crate::video::{
    CameraDescriptor, CameraDevice, CameraFacing, CameraInfo, CameraProvider, FixedRotation, FpsRange, PreviewConfig,
    VideoError, VideoResult,
};
use crate::{RingService, ServiceConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Init,
    Fini,
    MuteRingtone(bool),
    PlaceCall { account: String, to: String, video: bool },
    Accept(String),
    Refuse(String),
    HangUp(String),
    Hold(String),
    Unhold(String),
    ApplySettings { target: String, params: CaptureParams },
    SwitchInput { call_id: String, resource: String },
    AcquireWindow(u64),
    SetWindowGeometry { window: u64, width: u32, height: u32 },
    RegisterFrameSink { stream_id: String, window: u64 },
    UnregisterFrameSink { stream_id: String, window: u64 },
    ReleaseWindow(u64),
    ObtainFrameBuffer(usize),
    WriteFrame { len: usize, width: u32, height: u32, rotation: u32 },
    ReleaseFrameBuffer(bool),
}

#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    callbacks: Mutex<Option<Arc<dyn EngineCallbacks>>>,
    next_window: AtomicU64,
    polls: AtomicUsize,
    fail_init: AtomicBool,
    fail_windows: AtomicBool,
    fail_buffers: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_window: AtomicU64::new(0x100),
            ..Default::default()
        })
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn acquired_windows(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::AcquireWindow(_)))
    }

    pub fn released_windows(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::ReleaseWindow(_)))
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Callback sink registered by the last `init`.
    pub fn callbacks(&self) -> Option<Arc<dyn EngineCallbacks>> {
        self.callbacks.lock().unwrap().clone()
    }

    pub fn fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn fail_windows(&self, fail: bool) {
        self.fail_windows.store(fail, Ordering::SeqCst);
    }

    pub fn fail_frame_buffers(&self, fail: bool) {
        self.fail_buffers.store(fail, Ordering::SeqCst);
    }
}

impl NativeVideo for MockEngine {
    fn acquire_window(&self, surface: &dyn DrawingSurface) -> Option<NativeWindow> {
        self.record(EngineCall::AcquireWindow(surface.native_handle()));
        if self.fail_windows.load(Ordering::SeqCst) {
            return None;
        }
        NativeWindow::from_raw(self.next_window.fetch_add(1, Ordering::SeqCst))
    }

    fn set_window_geometry(&self, window: &NativeWindow, width: u32, height: u32) {
        self.record(EngineCall::SetWindowGeometry {
            window: window.raw(),
            width,
            height,
        });
    }

    fn register_frame_sink(&self, stream_id: &str, window: &NativeWindow) {
        self.record(EngineCall::RegisterFrameSink {
            stream_id: stream_id.to_string(),
            window: window.raw(),
        });
    }

    fn unregister_frame_sink(&self, stream_id: &str, window: &NativeWindow) {
        self.record(EngineCall::UnregisterFrameSink {
            stream_id: stream_id.to_string(),
            window: window.raw(),
        });
    }

    fn release_window(&self, window: NativeWindow) {
        self.record(EngineCall::ReleaseWindow(window.into_raw()));
    }

    fn obtain_frame_buffer(&self, len: usize) -> Option<FrameBuffer> {
        self.record(EngineCall::ObtainFrameBuffer(len));
        if self.fail_buffers.load(Ordering::SeqCst) {
            return None;
        }
        FrameBuffer::from_raw(0x8000, len)
    }

    fn write_frame(&self, data: &[u8], _buffer: &FrameBuffer, width: u32, height: u32, rotation: u32) {
        self.record(EngineCall::WriteFrame {
            len: data.len(),
            width,
            height,
            rotation,
        });
    }

    fn release_frame_buffer(&self, buffer: Option<FrameBuffer>) {
        self.record(EngineCall::ReleaseFrameBuffer(buffer.is_some()));
        if let Some(buffer) = buffer {
            buffer.into_raw();
        }
    }
}

impl NativeEngine for MockEngine {
    fn init(&self, callbacks: Arc<dyn EngineCallbacks>) -> EngineResult<()> {
        self.record(EngineCall::Init);
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(EngineError::Init("library not found".into()));
        }
        *self.callbacks.lock().unwrap() = Some(callbacks);
        Ok(())
    }

    fn fini(&self) {
        self.record(EngineCall::Fini);
        self.callbacks.lock().unwrap().take();
    }

    fn poll_events(&self) {
        self.polls.fetch_add(1, Ordering::SeqCst);
    }

    fn mute_ringtone(&self, mute: bool) {
        self.record(EngineCall::MuteRingtone(mute));
    }

    fn place_call(&self, account_id: &str, to: &str, video: bool) -> EngineResult<String> {
        self.record(EngineCall::PlaceCall {
            account: account_id.to_string(),
            to: to.to_string(),
            video,
        });
        Ok(format!("call-{to}"))
    }

    fn accept(&self, call_id: &str) -> EngineResult<()> {
        self.record(EngineCall::Accept(call_id.to_string()));
        Ok(())
    }

    fn refuse(&self, call_id: &str) -> EngineResult<()> {
        self.record(EngineCall::Refuse(call_id.to_string()));
        Ok(())
    }

    fn hang_up(&self, call_id: &str) -> EngineResult<()> {
        self.record(EngineCall::HangUp(call_id.to_string()));
        Ok(())
    }

    fn hold(&self, call_id: &str) -> EngineResult<()> {
        self.record(EngineCall::Hold(call_id.to_string()));
        Ok(())
    }

    fn unhold(&self, call_id: &str) -> EngineResult<()> {
        self.record(EngineCall::Unhold(call_id.to_string()));
        Ok(())
    }

    fn apply_settings(&self, target: &str, params: CaptureParams) -> EngineResult<()> {
        self.record(EngineCall::ApplySettings {
            target: target.to_string(),
            params,
        });
        Ok(())
    }

    fn switch_input(&self, call_id: &str, resource: &str) -> EngineResult<()> {
        self.record(EngineCall::SwitchInput {
            call_id: call_id.to_string(),
            resource: resource.to_string(),
        });
        Ok(())
    }
}

pub struct MockSurface {
    handle: u64,
    valid: AtomicBool,
}

impl MockSurface {
    pub fn new(handle: u64) -> Arc<Self> {
        Arc::new(Self {
            handle,
            valid: AtomicBool::new(true),
        })
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

impl DrawingSurface for MockSurface {
    fn native_handle(&self) -> u64 {
        self.handle
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraCall {
    Open(u32),
    DisplayOrientation(u32),
    PreviewSurface(u64),
    Configure(PreviewConfig),
    StartPreview,
    StopPreview,
    Release(u32),
}

#[derive(Default)]
struct CameraState {
    log: Mutex<Vec<CameraCall>>,
    open_devices: AtomicUsize,
    frame_callback: Mutex<Option<FrameCallback>>,
    error_callbacks: Mutex<Vec<ErrorCallback>>,
    fail_open: AtomicBool,
    fail_start: AtomicBool,
}

/// Camera provider with a back camera (id 0, sensor at 90°) and a front
/// camera (id 1, sensor at 270°).
pub struct MockCamera {
    cameras: Vec<CameraDescriptor>,
    fps_ranges: Vec<FpsRange>,
    state: Arc<CameraState>,
}

impl MockCamera {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cameras: vec![
                CameraDescriptor {
                    id: 0,
                    name: "Back Camera".into(),
                    info: CameraInfo {
                        facing: CameraFacing::Back,
                        orientation: 90,
                    },
                },
                CameraDescriptor {
                    id: 1,
                    name: "Front Camera".into(),
                    info: CameraInfo {
                        facing: CameraFacing::Front,
                        orientation: 270,
                    },
                },
            ],
            fps_ranges: vec![FpsRange::new(15, 15), FpsRange::new(7, 30), FpsRange::new(30, 30)],
            state: Arc::new(CameraState::default()),
        })
    }

    pub fn calls(&self) -> Vec<CameraCall> {
        self.state.log.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&CameraCall) -> bool) -> usize {
        self.state.log.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Devices opened and not yet released.
    pub fn open_devices(&self) -> usize {
        self.state.open_devices.load(Ordering::SeqCst)
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_start(&self, fail: bool) {
        self.state.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Deliver a frame through the currently installed frame callback.
    pub fn emit_frame(&self, data: &[u8]) -> bool {
        let mut callback = self.state.frame_callback.lock().unwrap();
        match callback.as_mut() {
            Some(cb) => {
                cb(data);
                true
            }
            None => false,
        }
    }

    /// Fire the error callback installed by the `index`-th started device,
    /// even if that device has since been released.
    pub fn fire_error(&self, index: usize, code: i32) {
        let callbacks = self.state.error_callbacks.lock().unwrap();
        (callbacks[index])(code);
    }
}

impl CameraProvider for MockCamera {
    fn devices(&self) -> VideoResult<Vec<CameraDescriptor>> {
        Ok(self.cameras.clone())
    }

    fn camera_info(&self, device_id: u32) -> VideoResult<CameraInfo> {
        self.cameras
            .iter()
            .find(|c| c.id == device_id)
            .map(|c| c.info)
            .ok_or_else(|| VideoError::CameraNotFound(device_id.to_string()))
    }

    fn native_params(&self, device_id: u32) -> VideoResult<CaptureParams> {
        self.camera_info(device_id)?;
        Ok(native_params(device_id))
    }

    fn open(&self, device_id: u32) -> VideoResult<Box<dyn CameraDevice>> {
        self.state.log.lock().unwrap().push(CameraCall::Open(device_id));
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(VideoError::CameraOpen {
                device_id,
                reason: "camera in use".into(),
            });
        }
        self.state.open_devices.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockCameraDevice {
            id: device_id,
            fps_ranges: self.fps_ranges.clone(),
            state: self.state.clone(),
        }))
    }
}

struct MockCameraDevice {
    id: u32,
    fps_ranges: Vec<FpsRange>,
    state: Arc<CameraState>,
}

impl MockCameraDevice {
    fn record(&self, call: CameraCall) {
        self.state.log.lock().unwrap().push(call);
    }
}

impl CameraDevice for MockCameraDevice {
    fn set_display_orientation(&mut self, degrees: u32) {
        self.record(CameraCall::DisplayOrientation(degrees));
    }

    fn set_preview_surface(&mut self, surface: &Arc<dyn DrawingSurface>) -> VideoResult<()> {
        self.record(CameraCall::PreviewSurface(surface.native_handle()));
        Ok(())
    }

    fn supported_fps_ranges(&self) -> Vec<FpsRange> {
        self.fps_ranges.clone()
    }

    fn configure(&mut self, config: &PreviewConfig) -> VideoResult<()> {
        self.record(CameraCall::Configure(*config));
        Ok(())
    }

    fn set_frame_callback(&mut self, callback: Option<FrameCallback>) {
        *self.state.frame_callback.lock().unwrap() = callback;
    }

    fn set_error_callback(&mut self, callback: Option<ErrorCallback>) {
        if let Some(callback) = callback {
            self.state.error_callbacks.lock().unwrap().push(callback);
        }
    }

    fn start_preview(&mut self) -> VideoResult<()> {
        self.record(CameraCall::StartPreview);
        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(VideoError::StartPreview("device busy".into()));
        }
        Ok(())
    }

    fn stop_preview(&mut self) {
        self.record(CameraCall::StopPreview);
    }

    fn release(self: Box<Self>) {
        self.record(CameraCall::Release(self.id));
        self.state.open_devices.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keeps every emitted event for inspection.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ServiceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Events emitted since the last call.
    pub fn take(&self) -> Vec<ServiceEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ServiceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// NV21 640x480 at 24 fps from `device_id`.
pub fn params(device_id: u32) -> CaptureParams {
    CaptureParams::new(device_id, PixelFormat::Nv21, 640, 480, 24)
}

/// What the mock camera reports as its native capture: NV21 1280x720 at 30 fps.
pub fn native_params(device_id: u32) -> CaptureParams {
    CaptureParams::new(device_id, PixelFormat::Nv21, 1280, 720, 30)
}

/// Service on its own executor with the mock camera and a 5ms poll interval.
pub fn service_with(engine: Arc<MockEngine>, events: Arc<RecordingSink>) -> RingService {
    let executor = SerializedExecutor::spawn("service-test").unwrap();
    RingService::with_executor(
        executor,
        engine,
        MockCamera::new(),
        Arc::new(FixedRotation::new(0)),
        events,
        ServiceConfig::default().with_poll_interval(Duration::from_millis(5)),
    )
}
