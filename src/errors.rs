use std::any::Any;

/// Outcome of a task that did not produce a value.
#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, thiserror::Error)]
pub enum SpawnError {
    /// The pool was shut down before the submission.
    #[error("submission rejected: executor is shut down")]
    Rejected,

    /// A non-blocking submit found the bounded queue full.
    #[error("task queue is full")]
    QueueFull,

    /// The task body panicked.
    #[error("task panicked: {0}")]
    Panic(String),

    /// The task was accepted but never ran because the executor shut down.
    #[error("executor shut down before the task ran")]
    Shutdown,

    #[error("timed out waiting for the result")]
    Timeout,
}

/// Failure to build a pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl PoolError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        PoolError::InvalidConfig(msg.into())
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
