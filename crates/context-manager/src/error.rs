use avs_threading::{ExecutorError, TimerError};
use thiserror::Error;

/// Errors constructing a [`ContextManager`](crate::ContextManager).
#[derive(Debug, Error)]
pub enum ContextManagerError {
    #[error("default endpoint id must not be empty")]
    EmptyDefaultEndpoint,
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Timer(#[from] TimerError),
}

pub type Result<T> = std::result::Result<T, ContextManagerError>;
