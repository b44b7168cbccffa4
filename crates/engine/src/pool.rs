//! Fixed-size pool of workers that turn queued jobs into running processes.
//!
//! A worker never waits for the process it started. It registers the handle,
//! spawns the child, hands the child to a completion watcher on the shared
//! [`TaskTracker`], and goes straight back to the queue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use scripthub_core::command::{split_script, CommandStatus};
use scripthub_core::store::CommandStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::process::{record_status, resolve_executable, spawn_child, watch_process, ChildCanceller, Watch};
use crate::queue::{Job, JobQueue};
use crate::registry::{ProcessHandle, ProcessRegistry};
use crate::sink::OutputSink;

/// Shared state every worker reads from.
pub(crate) struct WorkerContext {
    pub queue: Arc<JobQueue>,
    pub registry: Arc<ProcessRegistry>,
    pub store: Arc<dyn CommandStore>,
    pub watchers: TaskTracker,
    pub working_dir: Option<PathBuf>,
}

pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    stop: CancellationToken,
}

impl WorkerPool {
    /// Spawn `size` workers on the current runtime.
    pub(crate) fn start(size: usize, ctx: Arc<WorkerContext>) -> Self {
        let stop = CancellationToken::new();
        let workers = (0..size)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, Arc::clone(&ctx), stop.clone())))
            .collect();

        tracing::info!(workers = size, "Worker pool started");
        Self { workers, stop }
    }

    /// Number of workers not yet joined.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Ask every worker to exit after its current job, without draining the queue.
    pub(crate) fn stop(&self) {
        self.stop.cancel();
    }

    /// Wait for every worker to exit.
    ///
    /// Cancel-safe: workers already joined are not awaited again if this
    /// future is dropped and the call repeated.
    pub(crate) async fn join(&mut self) {
        while let Some(worker) = self.workers.last_mut() {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Worker task failed");
            }
            self.workers.pop();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn run_worker(worker_id: usize, ctx: Arc<WorkerContext>, stop: CancellationToken) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let job = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            job = ctx.queue.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let name = job.name.clone();
        if let Err(panic) = AssertUnwindSafe(launch(&ctx, job)).catch_unwind().await {
            tracing::error!(
                worker_id,
                command = %name,
                panic = panic_message(&*panic),
                "Job launch panicked",
            );
        }
    }

    tracing::debug!(worker_id, "Worker stopped");
}

/// Start one job. Every failure is logged here and never reaches the loop.
async fn launch(ctx: &WorkerContext, job: Job) {
    let Job { id, name, script } = job;

    let Some(parts) = split_script(&script) else {
        tracing::warn!(command = %name, "Blank script, job discarded");
        return;
    };

    let program = match resolve_executable(parts.program) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(
                command = %name,
                program = parts.program,
                error = %e,
                "Executable not found, job discarded",
            );
            return;
        }
    };

    let (canceller, requests) = ChildCanceller::channel();
    let handle = ProcessHandle::new(name.clone(), Arc::new(canceller));
    let handle_id = handle.id();
    let sink = OutputSink::new(id, name.clone(), Arc::clone(&ctx.store));

    // Registered before spawn so a cancel can never miss a live process.
    ctx.registry.register(handle).await;

    let child = match spawn_child(&program, &parts.args, ctx.working_dir.as_deref()) {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(command = %name, program = %program.display(), error = %e, "Failed to start process");
            ctx.registry.remove_if_current(&name, handle_id).await;
            record_status(ctx.store.as_ref(), id, &name, CommandStatus::Failed, None).await;
            return;
        }
    };

    tracing::info!(command = %name, pid = ?child.id(), program = %program.display(), "Process started");

    ctx.watchers.spawn(watch_process(
        child,
        Watch {
            id,
            name,
            handle_id,
            requests,
            sink,
            registry: Arc::clone(&ctx.registry),
            store: Arc::clone(&ctx.store),
        },
    ));
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
