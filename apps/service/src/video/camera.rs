//! Camera device abstraction.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ringd_engine::{CaptureParams, DrawingSurface, PixelFormat};

use super::VideoResult;

/// Which way a camera faces relative to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    Front,
    Back,
}

/// Static properties of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CameraInfo {
    pub facing: CameraFacing,
    /// Clockwise angle the sensor image must be rotated to be upright, in degrees
    pub orientation: u32,
}

/// Camera information for selection UI.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CameraDescriptor {
    pub id: u32,
    pub name: String,
    pub info: CameraInfo,
}

/// Inclusive frame-rate range supported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpsRange {
    pub min: u32,
    pub max: u32,
}

impl FpsRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, rate: u32) -> bool {
        self.min <= rate && rate <= self.max
    }
}

/// Parameters applied to a device before its preview starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewConfig {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// `None` keeps the device's default rate
    pub fps: Option<FpsRange>,
}

/// Called with the raw bytes of each captured frame.
pub type FrameCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Called with a device-specific error code when the device fails.
pub type ErrorCallback = Box<dyn Fn(i32) + Send + Sync>;

/// Enumerates and opens cameras.
pub trait CameraProvider: Send + Sync {
    fn devices(&self) -> VideoResult<Vec<CameraDescriptor>>;

    fn camera_info(&self, device_id: u32) -> VideoResult<CameraInfo>;

    /// Format, size and rate the device captures at when left to itself.
    fn native_params(&self, device_id: u32) -> VideoResult<CaptureParams>;

    /// Open a device for exclusive use.
    fn open(&self, device_id: u32) -> VideoResult<Box<dyn CameraDevice>>;
}

/// An open camera. Dropping it without [`release`](CameraDevice::release)
/// leaves the hardware claimed until the implementation's own cleanup runs.
pub trait CameraDevice: Send {
    /// Rotate the preview shown on the bound surface, in degrees.
    fn set_display_orientation(&mut self, degrees: u32);

    /// Bind the preview output to `surface`.
    fn set_preview_surface(&mut self, surface: &Arc<dyn DrawingSurface>) -> VideoResult<()>;

    /// Supported frame-rate ranges, in the device's enumeration order.
    fn supported_fps_ranges(&self) -> Vec<FpsRange>;

    fn configure(&mut self, config: &PreviewConfig) -> VideoResult<()>;

    /// Install or remove the per-frame callback.
    fn set_frame_callback(&mut self, callback: Option<FrameCallback>);

    /// Install or remove the device error callback.
    fn set_error_callback(&mut self, callback: Option<ErrorCallback>);

    fn start_preview(&mut self) -> VideoResult<()>;

    fn stop_preview(&mut self);

    /// Release the hardware.
    fn release(self: Box<Self>);
}

/// Current display rotation.
pub trait DisplayRotation: Send + Sync {
    /// Rotation of the display from its natural orientation: 0, 90, 180 or 270.
    fn rotation_degrees(&self) -> u32;
}

/// Display rotation set by the host, for platforms without a rotation source.
#[derive(Debug, Default)]
pub struct FixedRotation(AtomicU32);

impl FixedRotation {
    pub fn new(degrees: u32) -> Self {
        Self(AtomicU32::new(degrees % 360))
    }

    pub fn set(&self, degrees: u32) {
        self.0.store(degrees % 360, Ordering::Relaxed);
    }
}

impl DisplayRotation for FixedRotation {
    fn rotation_degrees(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}
