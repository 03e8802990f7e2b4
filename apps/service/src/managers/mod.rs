pub mod daemon_manager;
pub mod engine_bridge;
pub mod video_manager;
