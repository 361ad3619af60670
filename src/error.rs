use thiserror::Error;

/// Errors surfaced by the dispatcher to its callers.
///
/// Job failures are not part of this type: they are contained by the worker
/// that ran the job and only ever reach the event sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("submission queue is full (capacity {capacity}), job {job_id} dropped")]
    QueueFull { job_id: String, capacity: usize },

    #[error("pool is closed, job {job_id} rejected")]
    PoolClosed { job_id: String },

    #[error("dispatcher is already running")]
    AlreadyRunning,

    #[error("dispatcher is not running")]
    NotRunning,

    #[error("dispatcher has already been stopped")]
    Terminated,

    #[error("invalid dispatcher configuration: {0}")]
    InvalidConfig(String),
}

impl DispatchError {
    /// True for the rejections a producer can react to by resubmitting later.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, DispatchError::QueueFull { .. })
    }
}
