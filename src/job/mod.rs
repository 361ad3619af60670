use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use thiserror::Error;
use uuid::Uuid;

/// A unit of work the dispatcher can hand to a worker.
///
/// The dispatcher never looks inside a job: it only moves it from the
/// submission queue into exactly one worker inbox and logs its identifier.
#[async_trait]
pub trait Job: Send + Sync {
    /// Caller-assigned identifier, used for logging only.
    fn id(&self) -> &str;

    /// Run the job to completion.
    ///
    /// May take arbitrarily long. There is no timeout or cancellation; a job
    /// that needs either must build it in here.
    async fn execute(&self) -> Result<(), JobFailure>;
}

/// Owned, type-erased job as it travels through the pool.
pub type BoxedJob = Box<dyn Job>;

/// Reason a job reported for not completing successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct JobFailure {
    reason: String,
}

impl JobFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Convert a panic payload caught at the task boundary into a failure.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new(format!("job panicked: {message}"))
    }
}

impl From<anyhow::Error> for JobFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

impl From<std::io::Error> for JobFailure {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// A job built from an identifier and an async closure.
///
/// Handy for ad-hoc work and for tests; the closure runs once per `execute`.
pub struct FnJob<F> {
    id: String,
    run: F,
}

impl<F, Fut> FnJob<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobFailure>> + Send,
{
    pub fn new(id: impl Into<String>, run: F) -> Self {
        Self { id: id.into(), run }
    }

    /// Create a job with a random v4 identifier.
    pub fn anonymous(run: F) -> Self {
        Self::new(Uuid::new_v4().to_string(), run)
    }
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobFailure>> + Send,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), JobFailure> {
        (self.run)().await
    }
}
