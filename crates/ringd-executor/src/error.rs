use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Executor rejected task '{0}': worker thread has shut down")]
    Rejected(String),

    #[error("Task '{task}' panicked: {message}")]
    Panicked { task: String, message: String },

    #[error("Timed out waiting for task '{0}'")]
    Timeout(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
