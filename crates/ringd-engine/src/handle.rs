//! Owned native handles.
//!
//! The engine hands out raw integers where 0 means "absent". These wrappers
//! only exist for non-zero values and are neither `Clone` nor `Copy`, so a
//! handle has exactly one owner and releasing it consumes it.

use std::num::{NonZeroU64, NonZeroUsize};

use tracing::warn;

/// An acquired native window bound to a drawing surface.
#[derive(Debug, PartialEq, Eq)]
pub struct NativeWindow {
    raw: NonZeroU64,
}

impl NativeWindow {
    /// Wrap a raw window handle returned by the engine. Returns `None` for 0.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(|raw| Self { raw })
    }

    /// The raw handle value, for passing back into the engine.
    pub fn raw(&self) -> u64 {
        self.raw.get()
    }

    /// Give up ownership and return the raw value.
    ///
    /// Engine implementations call this from `release_window`.
    pub fn into_raw(self) -> u64 {
        let raw = self.raw.get();
        std::mem::forget(self);
        raw
    }
}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        warn!("Native window {:#x} dropped without being released", self.raw.get());
    }
}

/// A native frame buffer obtained for a single captured frame.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    ptr: NonZeroUsize,
    len: usize,
}

impl FrameBuffer {
    /// Wrap a raw buffer pointer returned by the engine. Returns `None` for 0.
    pub fn from_raw(ptr: usize, len: usize) -> Option<Self> {
        NonZeroUsize::new(ptr).map(|ptr| Self { ptr, len })
    }

    pub fn as_ptr(&self) -> usize {
        self.ptr.get()
    }

    /// Capacity in bytes requested when the buffer was obtained.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Give up ownership and return the raw pointer value.
    pub fn into_raw(self) -> usize {
        let ptr = self.ptr.get();
        std::mem::forget(self);
        ptr
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        warn!("Frame buffer {:#x} dropped without being released", self.ptr.get());
    }
}
