use thiserror::Error;

use ringd_engine::EngineError;
use ringd_executor::ExecutorError;

use crate::video::VideoError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error("{0} called from inside another service operation")]
    Reentrant(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
