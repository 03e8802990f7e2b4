//! Single worker thread execution for engine calls.
//!
//! The engine must only ever be driven from one thread. This crate provides
//! the [`SerializedExecutor`] that owns that thread and the [`EventPump`] that
//! periodically feeds the engine's event loop through it.

pub mod error;
pub mod executor;
pub mod pump;

pub use error::{ExecutorError, ExecutorResult};
pub use executor::SerializedExecutor;
pub use pump::EventPump;

/// Default interval between engine event loop polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
