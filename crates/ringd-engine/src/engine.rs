//! Native engine interface.
//!
//! The engine is single-threaded by contract: every method on [`NativeEngine`]
//! must be called from the service's worker thread. The frame primitives on
//! [`NativeVideo`] are the exception and may be called from a camera thread.

use std::sync::Arc;

use crate::callbacks::EngineCallbacks;
use crate::error::EngineResult;
use crate::handle::{FrameBuffer, NativeWindow};
use crate::types::CaptureParams;

/// A UI-owned drawing target. It may become invalid at any time.
pub trait DrawingSurface: Send + Sync {
    /// Platform handle passed to the engine when acquiring a window.
    fn native_handle(&self) -> u64;

    /// Whether the surface can still be drawn into.
    fn is_valid(&self) -> bool;
}

/// Window and frame primitives of the engine.
pub trait NativeVideo: Send + Sync {
    /// Acquire a native window for `surface`. `None` if the engine could not
    /// obtain one.
    fn acquire_window(&self, surface: &dyn DrawingSurface) -> Option<NativeWindow>;

    /// Set the buffer geometry of an acquired window.
    fn set_window_geometry(&self, window: &NativeWindow, width: u32, height: u32);

    /// Start delivering decoded frames of `stream_id` into `window`.
    fn register_frame_sink(&self, stream_id: &str, window: &NativeWindow);

    /// Stop delivering decoded frames of `stream_id` into `window`.
    fn unregister_frame_sink(&self, stream_id: &str, window: &NativeWindow);

    /// Release an acquired window.
    fn release_window(&self, window: NativeWindow);

    /// Obtain a native buffer large enough for one captured frame.
    fn obtain_frame_buffer(&self, len: usize) -> Option<FrameBuffer>;

    /// Copy a captured frame into `buffer` and queue it for encoding.
    fn write_frame(&self, data: &[u8], buffer: &FrameBuffer, width: u32, height: u32, rotation: u32);

    /// Return a frame buffer to the engine. `None` is a no-op.
    fn release_frame_buffer(&self, buffer: Option<FrameBuffer>);
}

/// The media/communication engine.
pub trait NativeEngine: NativeVideo + 'static {
    /// Initialize the engine and register the callback sink.
    fn init(&self, callbacks: Arc<dyn EngineCallbacks>) -> EngineResult<()>;

    /// Shut the engine down. Callbacks are not delivered afterwards.
    fn fini(&self);

    /// Run one iteration of the engine's internal event loop.
    fn poll_events(&self);

    /// Mute or unmute the incoming call ringtone.
    fn mute_ringtone(&self, mute: bool);

    /// Place an outgoing call and return its call id.
    fn place_call(&self, account_id: &str, to: &str, video: bool) -> EngineResult<String>;

    fn accept(&self, call_id: &str) -> EngineResult<()>;

    fn refuse(&self, call_id: &str) -> EngineResult<()>;

    fn hang_up(&self, call_id: &str) -> EngineResult<()>;

    fn hold(&self, call_id: &str) -> EngineResult<()>;

    fn unhold(&self, call_id: &str) -> EngineResult<()>;

    /// Push the capture parameters of a camera to the engine. `target` is a
    /// call id or a camera id.
    fn apply_settings(&self, target: &str, params: CaptureParams) -> EngineResult<()>;

    /// Switch the video input of a call to `resource` (e.g. `camera://1`).
    fn switch_input(&self, call_id: &str, resource: &str) -> EngineResult<()>;
}
