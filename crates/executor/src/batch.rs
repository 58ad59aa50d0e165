//! Fan-out batch execution over a [`RendererPool`].
//!
//! # Architecture
//!
//! ```text
//! index queue (pre-filled, closed) -> Workers (W) -> result slots (by index)
//!        0..len                         one renderer each
//! ```
//!
//! `W = min(pool.size(), job_count)`. Every worker acquires a single renderer
//! and drains job indices until the queue is empty, so one renderer serves
//! many jobs sequentially and never two jobs at once. Results are written to
//! the slot of their index, which keeps the output order identical to the
//! input order no matter which worker finishes first.

use crate::cancel::CancelToken;
use crate::pool::RendererPool;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use quire_traits::{Renderer, RendererFactory};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;

/// Why a job was never handed to [`BatchTask::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unattempted {
    /// The batch was cancelled before this job was dequeued.
    Cancelled,
    /// The worker that dequeued this job could not obtain a renderer.
    RendererUnavailable(String),
    /// The worker that owned this job terminated abnormally.
    WorkerAborted,
}

/// The per-job unit of work driven by [`BatchExecutor`].
///
/// Implementations own the job list and shared configuration; the executor
/// only deals in indices.
#[async_trait]
pub trait BatchTask<R: Renderer>: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Number of jobs in the batch; indices run from `0` to `job_count() - 1`.
    fn job_count(&self) -> usize;

    /// Process job `index` with an exclusively held renderer.
    async fn run(&self, index: usize, renderer: &mut R) -> Self::Output;

    /// Produce the result for a job that was never attempted.
    fn unattempted(&self, index: usize, reason: Unattempted) -> Self::Output;
}

type Slots<T> = Arc<[Mutex<Option<T>>]>;

fn fill<T>(slots: &[Mutex<Option<T>>], index: usize, value: T) {
    let mut slot = slots[index].lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        error!("[BATCH] Result slot #{} written twice; keeping the first.", index);
        return;
    }
    *slot = Some(value);
}

/// Runs a batch of jobs across the renderers of a pool.
pub struct BatchExecutor;

impl BatchExecutor {
    /// Runs every job of `task` and returns one output per job, in job order.
    ///
    /// Returns only after every worker has exited. Failures never abort the
    /// batch; each one is captured in the output of the job it belongs to.
    /// A batch cancelled before it starts acquires no renderer at all.
    pub async fn run<F, T>(
        pool: &Arc<RendererPool<F>>,
        task: Arc<T>,
        cancel: &CancelToken,
    ) -> Vec<T::Output>
    where
        F: RendererFactory,
        T: BatchTask<F::Renderer>,
    {
        let job_count = task.job_count();
        if job_count == 0 {
            debug!("[BATCH] Empty batch; no workers started.");
            return Vec::new();
        }
        if cancel.is_cancelled() {
            info!("[BATCH] Cancelled before start; skipping {} job(s).", job_count);
            return (0..job_count)
                .map(|index| task.unattempted(index, Unattempted::Cancelled))
                .collect();
        }

        let (tx, rx) = async_channel::bounded(job_count);
        for index in 0..job_count {
            if let Err(e) = tx.try_send(index) {
                error!("[BATCH] Could not queue job #{}: {}", index, e);
            }
        }
        drop(tx);

        let slots: Slots<T::Output> = (0..job_count).map(|_| Mutex::new(None)).collect();
        let worker_count = pool.size().min(job_count);
        info!(
            "[BATCH] Starting {} job(s) on {} worker(s).",
            job_count, worker_count
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            workers.spawn(run_worker(
                worker_id,
                Arc::clone(pool),
                Arc::clone(&task),
                rx.clone(),
                Arc::clone(&slots),
                cancel.clone(),
            ));
        }
        drop(rx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("[BATCH] Worker terminated abnormally: {}", e);
            }
        }

        slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                    .unwrap_or_else(|| task.unattempted(index, Unattempted::WorkerAborted))
            })
            .collect()
    }
}

async fn run_worker<F, T>(
    worker_id: usize,
    pool: Arc<RendererPool<F>>,
    task: Arc<T>,
    queue: async_channel::Receiver<usize>,
    slots: Slots<T::Output>,
    cancel: CancelToken,
) where
    F: RendererFactory,
    T: BatchTask<F::Renderer>,
{
    let mut renderer = match pool.acquire().await {
        Ok(renderer) => renderer,
        Err(e) => {
            warn!(
                "[WORKER-{}] No renderer available ({}); failing the jobs it dequeues.",
                worker_id, e
            );
            let reason = e.to_string();
            let mut failed = 0;
            while let Ok(index) = queue.recv().await {
                let why = if cancel.is_cancelled() {
                    Unattempted::Cancelled
                } else {
                    Unattempted::RendererUnavailable(reason.clone())
                };
                fill(&slots, index, task.unattempted(index, why));
                failed += 1;
            }
            info!("[WORKER-{}] Shutting down after failing {} job(s).", worker_id, failed);
            return;
        }
    };
    debug!("[WORKER-{}] Started.", worker_id);

    let mut processed = 0;
    while let Ok(index) = queue.recv().await {
        if cancel.is_cancelled() {
            fill(&slots, index, task.unattempted(index, Unattempted::Cancelled));
            continue;
        }
        debug!("[WORKER-{}] Processing job #{}.", worker_id, index);
        let output = task.run(index, &mut *renderer).await;
        fill(&slots, index, output);
        processed += 1;
    }

    info!("[WORKER-{}] Shutting down after {} job(s).", worker_id, processed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Counters, StubFactory, StubRenderer};
    use quire_traits::{DocumentMeta, RenderOptions, RenderRequest};
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    /// Renders the job index as text and remembers which renderer served it.
    struct EchoTask {
        jobs: usize,
        meta: DocumentMeta,
        options: RenderOptions,
        served_by: Mutex<Vec<(usize, usize)>>,
        panic_on: Option<usize>,
    }

    impl EchoTask {
        fn new(jobs: usize) -> Self {
            Self {
                jobs,
                meta: DocumentMeta::default(),
                options: RenderOptions::default(),
                served_by: Mutex::new(Vec::new()),
                panic_on: None,
            }
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Out {
        Rendered(usize, String),
        Skipped(usize, Unattempted),
    }

    #[async_trait]
    impl BatchTask<StubRenderer> for EchoTask {
        type Output = Out;

        fn job_count(&self) -> usize {
            self.jobs
        }

        async fn run(&self, index: usize, renderer: &mut StubRenderer) -> Out {
            if self.panic_on == Some(index) {
                panic!("job {} exploded", index);
            }
            let source = format!("job-{}", index);
            let request = RenderRequest {
                source: &source,
                meta: &self.meta,
                options: &self.options,
            };
            let output = renderer.render(request).await.unwrap();
            self.served_by.lock().unwrap().push((index, renderer.id));
            Out::Rendered(index, String::from_utf8(output.primary).unwrap())
        }

        fn unattempted(&self, index: usize, reason: Unattempted) -> Out {
            Out::Skipped(index, reason)
        }
    }

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[tokio::test]
    async fn test_empty_batch_starts_no_workers() {
        let factory = StubFactory::new();
        let counters = Arc::clone(&factory.counters);
        let pool = Arc::new(RendererPool::new(factory, 4));

        let results =
            BatchExecutor::run(&pool, Arc::new(EchoTask::new(0)), &CancelToken::new()).await;

        assert!(results.is_empty());
        assert_eq!(Counters::get(&counters.created), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_index_written_exactly_once_in_order() {
        init_logger();
        let factory = StubFactory::new().with_render_delay(Duration::from_millis(1));
        let pool = Arc::new(RendererPool::new(factory, 3));
        let task = Arc::new(EchoTask::new(25));

        let results = BatchExecutor::run(&pool, Arc::clone(&task), &CancelToken::new()).await;

        assert_eq!(results.len(), 25);
        for (index, result) in results.iter().enumerate() {
            assert_eq!(result, &Out::Rendered(index, format!("job-{}", index)));
        }
        let served: HashSet<usize> = task
            .served_by
            .lock()
            .unwrap()
            .iter()
            .map(|(index, _)| *index)
            .collect();
        assert_eq!(served.len(), 25);
    }

    #[tokio::test]
    async fn test_lazy_construction_for_small_batches() {
        let factory = StubFactory::new().with_render_delay(Duration::from_millis(5));
        let counters = Arc::clone(&factory.counters);
        let pool = Arc::new(RendererPool::new(factory, 8));

        let results =
            BatchExecutor::run(&pool, Arc::new(EchoTask::new(2)), &CancelToken::new()).await;

        assert_eq!(results.len(), 2);
        assert!(Counters::get(&counters.created) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_renderer_never_serves_two_jobs_at_once() {
        let factory = StubFactory::new().with_render_delay(Duration::from_millis(3));
        let counters = Arc::clone(&factory.counters);
        let pool = Arc::new(RendererPool::new(factory, 2));

        let results =
            BatchExecutor::run(&pool, Arc::new(EchoTask::new(10)), &CancelToken::new()).await;

        assert_eq!(results.len(), 10);
        assert!(Counters::get(&counters.peak_in_flight) <= 2);
        assert!(Counters::get(&counters.created) <= 2);
        assert_eq!(pool.idle(), pool.created());
    }

    #[tokio::test]
    async fn test_cancelled_batch_attempts_no_render() {
        let factory = StubFactory::new();
        let counters = Arc::clone(&factory.counters);
        let pool = Arc::new(RendererPool::new(factory, 3));
        let cancel = CancelToken::new();
        cancel.cancel();

        let results = BatchExecutor::run(&pool, Arc::new(EchoTask::new(6)), &cancel).await;

        assert_eq!(results.len(), 6);
        for (index, result) in results.iter().enumerate() {
            assert_eq!(result, &Out::Skipped(index, Unattempted::Cancelled));
        }
        assert_eq!(Counters::get(&counters.renders), 0);
        assert_eq!(Counters::get(&counters.created), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_during_failed_construction_reports_cancellation() {
        let factory = StubFactory::new()
            .failing_creates(1)
            .with_create_delay(Duration::from_millis(30));
        let pool = Arc::new(RendererPool::new(factory, 1));
        let cancel = CancelToken::new();

        let canceller = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                cancel.cancel();
            }
        });
        let results = BatchExecutor::run(&pool, Arc::new(EchoTask::new(4)), &cancel).await;
        canceller.await.unwrap();

        assert_eq!(results.len(), 4);
        for (index, result) in results.iter().enumerate() {
            assert_eq!(result, &Out::Skipped(index, Unattempted::Cancelled));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_mid_batch_lets_in_flight_renders_finish() {
        let factory = StubFactory::new().with_render_delay(Duration::from_millis(30));
        let counters = Arc::clone(&factory.counters);
        let pool = Arc::new(RendererPool::new(factory, 1));
        let cancel = CancelToken::new();

        let canceller = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cancel.cancel();
            }
        });
        let results = BatchExecutor::run(&pool, Arc::new(EchoTask::new(5)), &cancel).await;
        canceller.await.unwrap();

        assert_eq!(results[0], Out::Rendered(0, "job-0".to_string()));
        for (index, result) in results.iter().enumerate().skip(1) {
            assert_eq!(result, &Out::Skipped(index, Unattempted::Cancelled));
        }
        assert_eq!(Counters::get(&counters.renders), 1);
    }

    #[tokio::test]
    async fn test_construction_failure_fails_only_that_workers_jobs() {
        let factory = StubFactory::new().failing_creates(1);
        let pool = Arc::new(RendererPool::new(factory, 1));

        let results =
            BatchExecutor::run(&pool, Arc::new(EchoTask::new(3)), &CancelToken::new()).await;

        assert_eq!(results.len(), 3);
        for (index, result) in results.iter().enumerate() {
            match result {
                Out::Skipped(i, Unattempted::RendererUnavailable(reason)) => {
                    assert_eq!(*i, index);
                    assert!(reason.contains("stub engine missing"));
                }
                other => panic!("unexpected result {:?}", other),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_worker_yields_aborted_results() {
        let pool = Arc::new(RendererPool::new(StubFactory::new(), 1));
        let mut task = EchoTask::new(3);
        task.panic_on = Some(1);

        let results = BatchExecutor::run(&pool, Arc::new(task), &CancelToken::new()).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Out::Rendered(0, "job-0".to_string()));
        assert_eq!(results[1], Out::Skipped(1, Unattempted::WorkerAborted));
        // The only worker died, so the remaining job was never dequeued.
        assert_eq!(results[2], Out::Skipped(2, Unattempted::WorkerAborted));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_of_two_runs_jobs_in_parallel() {
        let factory = StubFactory::new().with_render_delay(Duration::from_millis(40));
        let pool = Arc::new(RendererPool::new(factory, 2));

        let started = Instant::now();
        let results =
            BatchExecutor::run(&pool, Arc::new(EchoTask::new(5)), &CancelToken::new()).await;
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 5);
        // ceil(5 / 2) * 40ms = 120ms; fully serial would be 200ms.
        assert!(elapsed >= Duration::from_millis(120), "took {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(200), "took {:?}", elapsed);
    }
}
