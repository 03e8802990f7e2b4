//! Incoming decoded video streams.

use ringd_engine::NativeWindow;

/// Decode resource announced by the engine for one stream.
#[derive(Debug)]
pub struct StreamResource {
    pub id: String,
    /// Path of the engine's shared decode buffer
    pub shm_path: String,
    pub width: u32,
    pub height: u32,
    pub is_mixer: bool,
    /// Window frames are rendered into; `None` while no surface is bound
    pub window: Option<NativeWindow>,
    /// When rendering to the current window began (RFC 3339)
    pub started_at: Option<String>,
}

impl StreamResource {
    pub fn new(id: &str, shm_path: &str, width: u32, height: u32, is_mixer: bool) -> Self {
        Self {
            id: id.to_string(),
            shm_path: shm_path.to_string(),
            width,
            height,
            is_mixer,
            window: None,
            started_at: None,
        }
    }

    pub fn is_rendering(&self) -> bool {
        self.window.is_some()
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            id: self.id.clone(),
            width: self.width,
            height: self.height,
            is_mixer: self.is_mixer,
            rendering: self.is_rendering(),
            started_at: self.started_at.clone(),
        }
    }
}

/// Serializable view of a stream for callers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StreamSnapshot {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub is_mixer: bool,
    pub rendering: bool,
    pub started_at: Option<String>,
}
