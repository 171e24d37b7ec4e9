use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor '{0}' is shut down")]
    ShutDown(String),
    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timer is shut down")]
    ShutDown,
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[source] std::io::Error),
}
