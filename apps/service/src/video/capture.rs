//! Local camera capture session and frame delivery.

use std::sync::Arc;

use tracing::{debug, trace};

use ringd_engine::{CaptureParams, NativeEngine};

use super::camera::{CameraDevice, CameraInfo, FpsRange};
use super::orientation::rotated_size;

/// The camera currently open for outgoing video.
pub struct CaptureSession {
    pub params: CaptureParams,
    pub info: CameraInfo,
    /// Rotation tagged on delivered frames, in degrees
    pub rotation: u32,
    /// Identity of the opened device, compared against error callbacks
    pub serial: u64,
    pub started_at: String,
    device: Box<dyn CameraDevice>,
}

impl CaptureSession {
    pub fn new(params: CaptureParams, info: CameraInfo, rotation: u32, serial: u64, device: Box<dyn CameraDevice>) -> Self {
        Self {
            params,
            info,
            rotation,
            serial,
            started_at: chrono::Utc::now().to_rfc3339(),
            device,
        }
    }

    /// Frame size as seen by the engine after rotation.
    pub fn output_size(&self) -> (u32, u32) {
        rotated_size(self.params.width, self.params.height, self.rotation)
    }

    pub fn is_front(&self) -> bool {
        self.info.facing == super::CameraFacing::Front
    }

    /// Detach callbacks, stop the preview and release the device.
    pub fn close(self) -> CaptureParams {
        let CaptureSession { params, mut device, serial, .. } = self;
        device.set_frame_callback(None);
        device.set_error_callback(None);
        device.stop_preview();
        device.release();
        debug!("Camera session {} closed (device {})", serial, params.device_id);
        params
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        let (width, height) = self.output_size();
        CaptureSnapshot {
            device_id: self.params.device_id,
            front_camera: self.is_front(),
            width,
            height,
            rotation: self.rotation,
            started_at: self.started_at.clone(),
        }
    }
}

/// Serializable view of the capture session for callers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CaptureSnapshot {
    pub device_id: u32,
    pub front_camera: bool,
    pub width: u32,
    pub height: u32,
    pub rotation: u32,
    pub started_at: String,
}

/// First supported range containing `rate`, in enumeration order.
pub fn select_fps_range(ranges: &[FpsRange], rate: u32) -> Option<FpsRange> {
    ranges.iter().copied().find(|range| range.contains(rate))
}

/// Hands captured frames to the engine.
pub struct FrameForwarder {
    video: Arc<dyn NativeEngine>,
    width: u32,
    height: u32,
    rotation: u32,
    frames: u64,
}

impl FrameForwarder {
    pub fn new(video: Arc<dyn NativeEngine>, width: u32, height: u32, rotation: u32) -> Self {
        Self {
            video,
            width,
            height,
            rotation,
            frames: 0,
        }
    }

    /// Copy one frame into a native buffer and give it to the engine. The
    /// buffer is returned to the engine even when obtaining it failed.
    pub fn deliver(&mut self, data: &[u8]) {
        let buffer = self.video.obtain_frame_buffer(data.len());
        match &buffer {
            Some(buffer) => {
                self.video
                    .write_frame(data, buffer, self.width, self.height, self.rotation);
            }
            None => trace!("No native buffer for {} byte frame", data.len()),
        }
        self.video.release_frame_buffer(buffer);

        self.frames += 1;
        if self.frames <= 3 {
            debug!(
                "CAMERA: Delivered frame {} ({}x{}, rotation {})",
                self.frames, self.width, self.height, self.rotation
            );
        }
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames
    }
}
