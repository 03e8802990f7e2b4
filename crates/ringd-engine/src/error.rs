use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine not started")]
    NotStarted,

    #[error("Failed to initialize engine: {0}")]
    Init(String),

    #[error("Call operation failed: {0}")]
    Call(String),

    #[error("Input switch failed: {0}")]
    SwitchInput(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
