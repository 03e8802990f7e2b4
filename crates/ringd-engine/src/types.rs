//! Value types exchanged with the native engine.

use serde::{Deserialize, Serialize};

/// Pixel layout of frames produced by a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, Y then U then V
    I420,
    /// Semi-planar YUV 4:2:0, Y then interleaved V/U
    Nv21,
    /// Planar YUV 4:2:0, Y then V then U
    Yv12,
}

impl PixelFormat {
    /// Bytes needed to hold one frame of `width` x `height` pixels.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let luma = width as usize * height as usize;
        match self {
            PixelFormat::I420 | PixelFormat::Nv21 | PixelFormat::Yv12 => luma + luma / 2,
        }
    }
}

/// Capture parameters requested by the engine for the local camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureParams {
    /// Camera device identifier
    pub device_id: u32,
    /// Requested pixel format
    pub format: PixelFormat,
    /// Capture width as produced by the sensor
    pub width: u32,
    /// Capture height as produced by the sensor
    pub height: u32,
    /// Requested frame rate, in the same unit as the device's fps ranges
    pub rate: u32,
}

impl CaptureParams {
    pub fn new(device_id: u32, format: PixelFormat, width: u32, height: u32, rate: u32) -> Self {
        Self {
            device_id,
            format,
            width,
            height,
            rate,
        }
    }
}
