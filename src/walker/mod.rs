//! # Parallel job walker (C3)
//!
//! Generic function [`walk`]: chases a set of initial jobs through a
//! caller-supplied handler that can spawn follow-up jobs, cancelling all
//! in-flight work on the first error (spec §4.3). [`walk_sequential`] is a
//! single-threaded depth-first variant for tests and low-resource
//! environments.
//!
//! Concurrency is bounded by a `tokio::sync::Semaphore`, with one spawned
//! task per unit of work; a handler can enqueue more jobs mid-walk, so the
//! job graph is free to grow as discovery proceeds rather than being fixed
//! up front.

pub mod state;

pub use state::WalkState;

use crate::error::IndexingError;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;

/// Enqueues follow-up jobs discovered while handling the current one.
pub struct Spawner<J> {
    tx: mpsc::UnboundedSender<J>,
    outstanding: Arc<AtomicI64>,
}

impl<J> Clone for Spawner<J> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            outstanding: self.outstanding.clone(),
        }
    }
}

impl<J> Spawner<J> {
    /// Enqueue a follow-up job. Counted against the walk's outstanding-work
    /// tally *before* it is sent, so the walk cannot terminate while this
    /// job is in flight between `spawn` and being picked up by a worker.
    pub fn spawn(&self, job: J) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            // Walk already finished (e.g. cancelled); undo the reservation.
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), IndexingError>> + Send>>;

/// Run `initial_jobs` to completion through `handler`, bounded to
/// `concurrency` concurrently-running handlers.
///
/// Termination: when every queued job has completed without spawning
/// further work (spec §4.3). The first handler error — or any error
/// returned while draining — aborts every other in-flight handler task and
/// is returned to the caller.
pub async fn walk<J, S, H>(
    initial_jobs: Vec<J>,
    initial_state: S,
    concurrency: usize,
    handler: Arc<H>,
) -> Result<S, IndexingError>
where
    J: Send + 'static,
    S: Clone + Send + Sync + 'static,
    H: Fn(J, Spawner<J>, WalkState<S>) -> HandlerFuture + Send + Sync + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<J>();
    let outstanding = Arc::new(AtomicI64::new(initial_jobs.len() as i64));
    let state = WalkState::new(initial_state);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let done = Arc::new(Notify::new());
    let error_slot: Arc<Mutex<Option<IndexingError>>> = Arc::new(Mutex::new(None));
    let cancelled = Arc::new(AtomicBool::new(false));
    let handles: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

    for job in initial_jobs {
        let _ = tx.send(job);
    }

    loop {
        if outstanding.load(Ordering::SeqCst) <= 0 || cancelled.load(Ordering::SeqCst) {
            break;
        }
        tokio::select! {
            maybe_job = rx.recv() => {
                let Some(job) = maybe_job else { break; };
                let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
                let spawner = Spawner { tx: tx.clone(), outstanding: outstanding.clone() };
                let state = state.clone();
                let handler = handler.clone();
                let outstanding = outstanding.clone();
                let done = done.clone();
                let error_slot = error_slot.clone();
                let cancelled = cancelled.clone();
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    let result = handler(job, spawner, state).await;
                    let remaining = outstanding.fetch_sub(1, Ordering::SeqCst) - 1;
                    if let Err(e) = result {
                        let mut slot = error_slot.lock().await;
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                        cancelled.store(true, Ordering::SeqCst);
                    }
                    if remaining <= 0 || cancelled.load(Ordering::SeqCst) {
                        done.notify_one();
                    }
                });
                let mut guard = handles.lock().await;
                guard.push(handle);
            }
            _ = done.notified() => {}
        }
    }

    // Stop accepting/producing further jobs, then abort anything still
    // running so a cancellation (error or otherwise) does not leave
    // orphaned handlers behind.
    drop(rx);
    if cancelled.load(Ordering::SeqCst) {
        let guard = handles.lock().await;
        for handle in guard.iter() {
            handle.abort();
        }
    } else {
        // Let any already-completing handlers finish naturally.
        let mut guard = handles.lock().await;
        for handle in guard.drain(..) {
            let _ = handle.await;
        }
    }

    if let Some(e) = error_slot.lock().await.take() {
        return Err(e);
    }

    Ok(state.into_inner().await)
}

/// Single-threaded depth-first walk: processes one job at a time, pushing
/// spawned follow-ups onto a stack, so the most recently discovered job runs
/// next (spec §4.3: "A single-threaded depth-first variant exists for tests
/// and low-resource environments").
pub async fn walk_sequential<J, S, H, Fut>(
    initial_jobs: Vec<J>,
    initial_state: S,
    handler: H,
) -> Result<S, IndexingError>
where
    J: Send + 'static,
    S: Clone,
    H: Fn(J, SequentialSpawner<J>, WalkState<S>) -> Fut,
    Fut: Future<Output = Result<(), IndexingError>>,
{
    let state = WalkState::new(initial_state);
    let mut stack = initial_jobs;
    while let Some(job) = stack.pop() {
        let mut spawned = Vec::new();
        let spawner = SequentialSpawner { out: &mut spawned };
        handler(job, spawner, state.clone()).await?;
        stack.extend(spawned);
    }
    Ok(state.into_inner().await)
}

/// Collects follow-up jobs for [`walk_sequential`] instead of dispatching
/// them onto a channel.
pub struct SequentialSpawner<'a, J> {
    out: &'a mut Vec<J>,
}

impl<'a, J> SequentialSpawner<'a, J> {
    pub fn spawn(&mut self, job: J) {
        self.out.push(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    fn boxed<F>(fut: F) -> HandlerFuture
    where
        F: Future<Output = Result<(), IndexingError>> + Send + 'static,
    {
        Box::pin(fut)
    }

    #[tokio::test]
    async fn terminates_when_no_more_jobs_spawned() {
        let visited = Arc::new(Mutex::new(HashSet::<u32>::new()));
        let visited2 = visited.clone();
        let handler = move |job: u32, spawner: Spawner<u32>, _state: WalkState<()>| {
            let visited = visited2.clone();
            boxed(async move {
                let mut seen = visited.lock().await;
                if seen.insert(job) && job < 5 {
                    spawner.spawn(job + 1);
                }
                Ok(())
            })
        };
        let _ = walk(vec![0], (), 4, Arc::new(handler)).await.unwrap();
        let seen = visited.lock().await;
        assert_eq!(*seen, (0..=5).collect());
    }

    #[tokio::test]
    async fn dedup_prevents_revisits_on_cyclic_graphs() {
        // A "cyclic" graph: every job spawns job 0 again plus itself+1 up to
        // a bound; dedup against shared state keeps this finite (spec I6).
        let handler = |job: u32, spawner: Spawner<u32>, state: WalkState<HashSet<u32>>| {
            boxed(async move {
                let first_visit = state
                    .compare_and_swap(
                        |seen| !seen.contains(&job),
                        |seen| {
                            seen.insert(job);
                        },
                    )
                    .await;
                if first_visit && job < 10 {
                    spawner.spawn(0);
                    spawner.spawn(job + 1);
                }
                Ok(())
            })
        };
        let result = walk(vec![0], HashSet::new(), 8, Arc::new(handler))
            .await
            .unwrap();
        assert_eq!(result, (0..=10).collect());
    }

    #[tokio::test]
    async fn first_error_cancels_and_propagates() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = attempts.clone();
        let handler = move |job: u32, spawner: Spawner<u32>, _state: WalkState<()>| {
            let attempts = attempts2.clone();
            boxed(async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                if job == 0 {
                    spawner.spawn(1);
                    spawner.spawn(2);
                    return Err(IndexingError::ClaimFetchError("boom".into()));
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Ok(())
            })
        };
        let result = walk(vec![0], (), 4, Arc::new(handler)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn sequential_walk_is_depth_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let order2 = order.clone();
        let handler = move |job: u32, mut spawner: SequentialSpawner<u32>, _state: WalkState<()>| {
            let order = order2.clone();
            async move {
                order.lock().await.push(job);
                if job == 0 {
                    spawner.spawn(1);
                    spawner.spawn(2);
                }
                Ok(())
            }
        };
        walk_sequential(vec![0], (), handler).await.unwrap();
        // DFS over a stack pops the most recently pushed job first: 0, then
        // 2 (pushed last), then 1.
        assert_eq!(*order.lock().await, vec![0, 2, 1]);
    }
}
