pub mod calls;
pub mod daemon;
pub mod video;
