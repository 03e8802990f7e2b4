//! Callbacks delivered by the engine.

use crate::types::CaptureParams;

/// Trait for handling engine events. The engine may call these from any of
/// its own threads; implementations must not touch service state directly.
pub trait EngineCallbacks: Send + Sync + 'static {
    /// Called when a decode buffer for an incoming stream becomes available.
    ///
    /// # Arguments
    /// * `stream_id` - Call or conference id of the stream
    /// * `shm_path` - Path of the shared decode buffer
    /// * `width` - Decoded frame width in pixels
    /// * `height` - Decoded frame height in pixels
    /// * `is_mixer` - Whether the stream is a multi-party composite
    fn on_decoding_started(&self, stream_id: &str, shm_path: &str, width: u32, height: u32, is_mixer: bool);

    /// Called when the decode buffer of a stream goes away.
    fn on_decoding_stopped(&self, stream_id: &str);

    /// Called when the engine wants the local camera opened.
    fn on_start_capture(&self, params: CaptureParams);

    /// Called when the engine no longer needs the local camera.
    fn on_stop_capture(&self);
}
