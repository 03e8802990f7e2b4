//! Registry of UI-owned drawing surfaces.
//!
//! The UI registers surfaces here independently of stream lifecycle. Only weak
//! references are kept: a surface dropped by the UI, or one that reports
//! itself invalid, is treated as absent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use ringd_engine::DrawingSurface;

#[derive(Default)]
pub struct SurfaceRegistry {
    video: Mutex<HashMap<String, Weak<dyn DrawingSurface>>>,
    preview: Mutex<Option<Weak<dyn DrawingSurface>>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the surface remote video of `stream_id` should be drawn into.
    pub fn register_video(&self, stream_id: &str, surface: &Arc<dyn DrawingSurface>) {
        let mut video = self.video.lock().unwrap_or_else(PoisonError::into_inner);
        video.insert(stream_id.to_string(), Arc::downgrade(surface));
        debug!("Video surface registered for {}", stream_id);
    }

    pub fn unregister_video(&self, stream_id: &str) {
        let mut video = self.video.lock().unwrap_or_else(PoisonError::into_inner);
        if video.remove(stream_id).is_some() {
            debug!("Video surface unregistered for {}", stream_id);
        }
    }

    /// Live surface for `stream_id`, if any.
    pub fn video_surface(&self, stream_id: &str) -> Option<Arc<dyn DrawingSurface>> {
        let video = self.video.lock().unwrap_or_else(PoisonError::into_inner);
        video.get(stream_id).and_then(upgrade_valid)
    }

    /// Register the local camera preview surface.
    pub fn set_preview(&self, surface: &Arc<dyn DrawingSurface>) {
        let mut preview = self.preview.lock().unwrap_or_else(PoisonError::into_inner);
        *preview = Some(Arc::downgrade(surface));
        debug!("Preview surface registered");
    }

    pub fn clear_preview(&self) {
        let mut preview = self.preview.lock().unwrap_or_else(PoisonError::into_inner);
        *preview = None;
    }

    /// Live preview surface, if any.
    pub fn preview_surface(&self) -> Option<Arc<dyn DrawingSurface>> {
        let preview = self.preview.lock().unwrap_or_else(PoisonError::into_inner);
        preview.as_ref().and_then(upgrade_valid)
    }
}

fn upgrade_valid(weak: &Weak<dyn DrawingSurface>) -> Option<Arc<dyn DrawingSurface>> {
    weak.upgrade().filter(|surface| surface.is_valid())
}
