//! # Bounded job queue (C2)
//!
//! Single-typed asynchronous worker pool with configurable buffer,
//! concurrency, per-job timeout, shutdown timeout, and an error callback
//! (spec §4.2): a fixed number of worker tasks share one bounded `mpsc`
//! channel behind a mutex, so jobs load-balance across whichever worker is
//! free. This queue only ever carries in-process follow-up work (index
//! fan-out jobs, provider-caching jobs), never cross-process jobs, so there
//! is no external transport to configure.

pub mod job;

pub use job::{JobError, JobHandler};

use crate::error::IndexingError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::warn;

pub struct QueueConfig {
    pub buffer: usize,
    pub concurrency: usize,
    pub job_timeout: Duration,
    pub shutdown_timeout: Duration,
    /// Invoked with every handler error or timeout, in place of (not instead
    /// of) the queue's own `warn!` log (spec §4.2: "handler errors are
    /// surfaced to the error callback, not to the producer").
    pub error_callback: Arc<dyn Fn(JobError) + Send + Sync>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            buffer: 1024,
            concurrency: 16,
            job_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            error_callback: Arc::new(|_| {}),
        }
    }
}

/// Bounded, single-typed async job queue.
///
/// `concurrency` worker tasks each run a single receive loop (spec §4.2:
/// "Exactly one job-handler goroutine per worker"), sharing one bounded
/// `mpsc` channel behind a mutex so jobs are load-balanced across workers.
pub struct JobQueue<J: Send + 'static> {
    sender: mpsc::Sender<J>,
    closing: Arc<AtomicBool>,
    workers: Mutex<Option<JoinSet<()>>>,
    shutdown_timeout: Duration,
}

impl<J: Send + 'static> JobQueue<J> {
    pub fn new<H>(handler: Arc<H>, config: QueueConfig) -> Self
    where
        H: JobHandler<J> + 'static,
    {
        let (sender, receiver) = mpsc::channel::<J>(config.buffer);
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = JoinSet::new();
        for _ in 0..config.concurrency {
            let receiver = receiver.clone();
            let handler = handler.clone();
            let job_timeout = config.job_timeout;
            let error_callback = config.error_callback.clone();
            workers.spawn(async move {
                loop {
                    let job = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        break;
                    };
                    match tokio::time::timeout(job_timeout, handler.handle(job)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(error = %e, "job handler returned an error");
                            error_callback(e);
                        }
                        Err(_) => {
                            warn!("job handler timed out");
                            error_callback(JobError::TimedOut);
                        }
                    }
                }
            });
        }

        Self {
            sender,
            closing: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Some(workers)),
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Enqueue a job. Fails with `QUEUE_SHUTDOWN` if the queue is draining
    /// or closed (spec §4.2).
    pub async fn queue(&self, job: J) -> Result<(), IndexingError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(IndexingError::QueueShutdown);
        }
        self.sender
            .send(job)
            .await
            .map_err(|_| IndexingError::QueueShutdown)
    }

    /// Non-blocking enqueue; callers on a hot path that would rather drop
    /// work than block on a saturated queue (e.g. the index-fan-out
    /// follow-up, spec §4.5 step 3, whose failures "are logged but do not
    /// fail the lookup") can use this instead of `queue`.
    pub fn try_queue(&self, job: J) -> Result<(), IndexingError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(IndexingError::QueueShutdown);
        }
        self.sender
            .try_send(job)
            .map_err(|_| IndexingError::QueueShutdown)
    }

    /// Refuse new jobs, drain in-flight work, and — if `shutdown_timeout` is
    /// configured — stop waiting after that delay and abort whatever is
    /// still running (spec §4.2).
    pub async fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let mut guard = self.workers.lock().await;
        if let Some(mut workers) = guard.take() {
            let drain = async {
                while workers.join_next().await.is_some() {}
            };
            if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
                workers.shutdown().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn processes_queued_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handler_counter = counter.clone();
        let handler = move |_job: u32| {
            let counter = handler_counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };
        let queue: JobQueue<u32> = JobQueue::new(Arc::new(handler), QueueConfig::default());
        for i in 0..10 {
            queue.queue(i).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn queue_after_shutdown_fails() {
        let handler = |_job: u32| async move { Ok(()) };
        let queue: JobQueue<u32> = JobQueue::new(Arc::new(handler), QueueConfig::default());
        queue.shutdown().await;
        assert!(matches!(queue.queue(1).await, Err(IndexingError::QueueShutdown)));
    }
}
