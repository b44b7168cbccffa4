//! Asynchronous command-execution engine.
//!
//! [`Engine`] ties the pieces together:
//!
//! - [`queue::JobQueue`] hands named jobs from submitters to workers.
//! - [`pool::WorkerPool`] runs a fixed number of workers that resolve, spawn,
//!   and register each job's process without waiting for it to exit.
//! - [`registry::ProcessRegistry`] maps job names to live, cancellable
//!   process handles.
//! - [`sink::OutputSink`] appends a job's stdout and stderr to its stored
//!   record, one chunk at a time.
//! - [`process`] holds the completion watcher that reaps each child, records
//!   its final status, and clears its registry entry.

pub mod error;
pub mod pool;
pub mod process;
pub mod queue;
pub mod registry;
pub mod sink;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use scripthub_core::store::CommandStore;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;

pub use error::{CancelError, EngineError};
pub use queue::Job;
pub use registry::CancelOutcome;

use pool::{WorkerContext, WorkerPool};
use queue::JobQueue;
use registry::ProcessRegistry;

/// Upper bound on the forced-cancellation phase of [`Engine::shutdown`].
const FORCE_CANCEL_TIMEOUT: Duration = Duration::from_secs(1);

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of workers. Must be at least 1.
    pub workers: usize,
    /// Queue capacity; `0` makes submission a synchronous hand-off.
    pub queue_capacity: usize,
    /// Working directory for every spawned process; inherited when `None`.
    pub working_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 0,
            working_dir: None,
        }
    }
}

/// What [`Engine::shutdown`] had to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers and every completion watcher finished within the grace period.
    pub drained: bool,
    /// Queued jobs dropped without being started.
    pub discarded: usize,
    /// Live processes that were sent a kill signal after the grace period.
    pub force_cancelled: usize,
}

/// Running engine: queue, workers, registry, and completion watchers.
pub struct Engine {
    queue: Arc<JobQueue>,
    registry: Arc<ProcessRegistry>,
    watchers: TaskTracker,
    pool: Mutex<Option<WorkerPool>>,
}

impl Engine {
    /// Start the worker pool on the current Tokio runtime.
    pub fn start(config: EngineConfig, store: Arc<dyn CommandStore>) -> Result<Self, EngineError> {
        if config.workers == 0 {
            return Err(EngineError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }

        let queue = Arc::new(JobQueue::new(config.queue_capacity));
        let registry = Arc::new(ProcessRegistry::new());
        let watchers = TaskTracker::new();

        let ctx = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            registry: Arc::clone(&registry),
            store,
            watchers: watchers.clone(),
            working_dir: config.working_dir,
        });
        let pool = WorkerPool::start(config.workers, ctx);

        tracing::info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Execution engine started",
        );

        Ok(Self {
            queue,
            registry,
            watchers,
            pool: Mutex::new(Some(pool)),
        })
    }

    /// Enqueue a job. Blocks while the queue is full (or, with capacity 0,
    /// until a worker takes it) and fails once shutdown has begun.
    pub async fn submit(&self, job: Job) -> Result<(), EngineError> {
        let name = job.name.clone();
        self.queue.submit(job).await?;
        tracing::debug!(command = %name, "Job accepted");
        Ok(())
    }

    /// Signal the live process for `name`, if any.
    ///
    /// Returns once the signal is issued; the process may still be exiting.
    pub async fn cancel(&self, name: &str) -> Result<CancelOutcome, CancelError> {
        let outcome = self.registry.remove_and_cancel(name).await?;
        tracing::info!(command = %name, outcome = ?outcome, "Cancel handled");
        Ok(outcome)
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// True once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.queue.is_closed()
    }

    /// Stop accepting jobs and wind the engine down within `grace`.
    ///
    /// 1. The queue is closed; pending and future submissions fail.
    /// 2. Workers drain jobs already queued, then exit.
    /// 3. Up to `grace` is spent waiting for workers and for every running
    ///    process to finish.
    /// 4. If the deadline passes, still-queued jobs are discarded, workers
    ///    are stopped and joined, and every process they registered is sent a
    ///    kill signal. This phase is bounded by one second and does not wait
    ///    for the processes to exit.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let deadline = Instant::now() + grace;
        self.queue.close().await;

        let Some(mut pool) = self.pool.lock().await.take() else {
            tracing::debug!("Engine already shut down");
            return ShutdownReport {
                drained: self.watchers.is_empty(),
                ..ShutdownReport::default()
            };
        };
        self.watchers.close();

        tracing::info!(
            grace_ms = grace.as_millis() as u64,
            running = self.registry.len().await,
            "Engine shutting down",
        );

        let drained = tokio::time::timeout_at(deadline, async {
            pool.join().await;
            self.watchers.wait().await;
        })
        .await
        .is_ok();

        if drained {
            tracing::info!("Engine drained");
            return ShutdownReport {
                drained: true,
                ..ShutdownReport::default()
            };
        }

        pool.stop();
        let forced_deadline = Instant::now() + FORCE_CANCEL_TIMEOUT;

        let discarded =
            match tokio::time::timeout_at(forced_deadline, self.queue.discard_pending()).await {
                Ok(discarded) => discarded,
                Err(_) => {
                    tracing::warn!("Timed out discarding queued jobs");
                    0
                }
            };

        // A worker still mid-launch registers its handle before it exits.
        if tokio::time::timeout_at(forced_deadline, pool.join())
            .await
            .is_err()
        {
            tracing::warn!("Workers did not stop before forced cancellation");
        }

        let force_cancelled =
            match tokio::time::timeout_at(forced_deadline, self.cancel_registered()).await {
                Ok(cancelled) => cancelled,
                Err(_) => {
                    tracing::warn!("Forced cancellation did not finish in time");
                    0
                }
            };

        tracing::warn!(
            discarded,
            force_cancelled,
            "Grace period elapsed; remaining processes were signalled",
        );
        ShutdownReport {
            drained: false,
            discarded,
            force_cancelled,
        }
    }

    /// Signal every registered process. Returns how many were signalled.
    async fn cancel_registered(&self) -> usize {
        let names: Vec<String> = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|handle| handle.name().to_string())
            .collect();

        let outcomes = join_all(names.iter().map(|name| self.registry.remove_and_cancel(name))).await;

        let mut cancelled = 0;
        for (name, outcome) in names.iter().zip(outcomes) {
            match outcome {
                Ok(CancelOutcome::Cancelled) => cancelled += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!(command = %name, error = %e, "Forced cancel failed"),
            }
        }
        cancelled
    }
}
