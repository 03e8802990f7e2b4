pub mod callbacks;
pub mod engine;
pub mod error;
pub mod handle;
pub mod types;

pub use callbacks::EngineCallbacks;
pub use engine::{DrawingSurface, NativeEngine, NativeVideo};
pub use error::{EngineError, EngineResult};
pub use handle::{FrameBuffer, NativeWindow};
pub use types::*;
