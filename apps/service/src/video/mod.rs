//! Video resources: drawing surfaces, decode streams and camera capture.
//!
//! This module provides:
//! - Weak registry of UI-owned drawing surfaces
//! - Camera device abstraction and orientation math
//! - Per-stream decode state and capture session state
//! - Frame delivery from the camera into the engine

pub mod camera;
pub mod capture;
#[cfg(feature = "nokhwa-camera")]
mod convert;
pub mod decode;
#[cfg(feature = "nokhwa-camera")]
pub mod nokhwa_camera;
pub mod orientation;
pub mod surface;

pub use camera::{
    CameraDescriptor, CameraDevice, CameraFacing, CameraInfo, CameraProvider, DisplayRotation, FixedRotation,
    FpsRange, PreviewConfig,
};
pub use capture::{CaptureSnapshot, FrameForwarder};
pub use decode::{StreamResource, StreamSnapshot};
pub use surface::SurfaceRegistry;

/// Video error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoError {
    #[error("Camera not found: {0}")]
    CameraNotFound(String),

    #[error("Failed to open camera {device_id}: {reason}")]
    CameraOpen { device_id: u32, reason: String },

    #[error("Failed to bind preview surface: {0}")]
    PreviewSurface(String),

    #[error("Failed to configure camera: {0}")]
    Configure(String),

    #[error("Failed to start preview: {0}")]
    StartPreview(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

pub type VideoResult<T> = Result<T, VideoError>;
