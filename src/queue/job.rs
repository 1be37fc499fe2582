//! Job handler trait for the bounded job queue (spec §4.2).

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),
    #[error("job timed out")]
    TimedOut,
}

/// A single-typed handler invoked once per queued job. Errors are surfaced
/// to the queue's error callback, never to the producer that called
/// `queue()` (spec §4.2: "handler errors are surfaced to the error callback
/// (not to the producer)").
#[async_trait]
pub trait JobHandler<J>: Send + Sync
where
    J: Send + 'static,
{
    async fn handle(&self, job: J) -> Result<(), JobError>;
}

#[async_trait]
impl<J, F, Fut> JobHandler<J> for F
where
    J: Send + 'static,
    F: Fn(J) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<(), JobError>> + Send,
{
    async fn handle(&self, job: J) -> Result<(), JobError> {
        (self)(job).await
    }
}
