//! OS process plumbing: executable lookup, spawning, output pumps, and the
//! per-process completion watcher.
//!
//! The watcher task owns the [`Child`]. Cancellation reaches it through a
//! request channel held by [`ChildCanceller`], so the registry never touches
//! the child directly. As soon as the watcher observes the exit it closes
//! the channel and clears the registry entry, even while a descendant still
//! holds the output pipes open. Any cancel still pending or sent later
//! resolves to [`CancelError::AlreadyExited`].

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use scripthub_core::command::CommandStatus;
use scripthub_core::store::CommandStore;
use scripthub_core::types::DbId;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

use crate::error::CancelError;
use crate::registry::{Cancellable, ProcessRegistry};
use crate::sink::OutputSink;

/// Maximum bytes read from a stream per call.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Buffered cancel requests per process before `cancel` waits.
const CANCEL_REQUEST_BUFFER: usize = 4;

/// Reply channel for one cancel request.
pub(crate) type CancelRequest = oneshot::Sender<io::Result<()>>;

/// Resolve `program` against `PATH` (or as a path, if it contains a separator).
pub fn resolve_executable(program: &str) -> Result<PathBuf, which::Error> {
    which::which(program)
}

/// Spawn `program` with piped stdout/stderr and no stdin.
///
/// The child is killed if its handle is dropped before it is reaped.
pub(crate) fn spawn_child(
    program: &Path,
    args: &[&str],
    working_dir: Option<&Path>,
) -> io::Result<Child> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    cmd.spawn()
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// [`Cancellable`] for an OS process owned by a completion watcher.
pub struct ChildCanceller {
    requests: mpsc::Sender<CancelRequest>,
}

impl ChildCanceller {
    /// Create a canceller and the receiving end its watcher will serve.
    ///
    /// Requests sent before the watcher starts are buffered; if the
    /// receiver is dropped without serving them they resolve as
    /// already exited.
    pub(crate) fn channel() -> (Self, mpsc::Receiver<CancelRequest>) {
        let (tx, rx) = mpsc::channel(CANCEL_REQUEST_BUFFER);
        (Self { requests: tx }, rx)
    }
}

#[async_trait::async_trait]
impl Cancellable for ChildCanceller {
    async fn cancel(&self) -> Result<(), CancelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(reply_tx)
            .await
            .map_err(|_| CancelError::AlreadyExited)?;

        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CancelError::Signal(e)),
            Err(_) => Err(CancelError::AlreadyExited),
        }
    }
}

// ---------------------------------------------------------------------------
// Completion watcher
// ---------------------------------------------------------------------------

/// Everything a completion watcher needs besides the child itself.
pub(crate) struct Watch {
    pub id: DbId,
    pub name: String,
    pub handle_id: u64,
    pub requests: mpsc::Receiver<CancelRequest>,
    pub sink: OutputSink,
    pub registry: Arc<ProcessRegistry>,
    pub store: Arc<dyn CommandStore>,
}

/// Drive one process to completion.
///
/// Marks the record running and pumps both output streams into the sink.
/// Cancel requests are served until the child exits. At exit the request
/// channel is closed and this watcher's registry entry removed, without
/// waiting for the pumps. The final status is recorded once both streams
/// reach EOF.
pub(crate) async fn watch_process(mut child: Child, watch: Watch) {
    let Watch {
        id,
        name,
        handle_id,
        mut requests,
        sink,
        registry,
        store,
    } = watch;

    record_status(store.as_ref(), id, &name, CommandStatus::Running, None).await;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let exited = async {
        let outcome = wait_or_kill(&mut child, &mut requests, &name).await;
        release_cancellers(&mut requests);
        registry.remove_if_current(&name, handle_id).await;
        outcome
    };

    let ((exit, cancelled), (), ()) = tokio::join!(
        exited,
        pump(stdout, &sink, "stdout"),
        pump(stderr, &sink, "stderr"),
    );

    let (status, exit_code) = final_status(&name, &exit, cancelled);
    tracing::info!(command = %name, status = ?status, exit_code = ?exit_code, "Process finished");
    record_status(store.as_ref(), id, &name, status, exit_code).await;
}

/// Refuse further cancel requests and drop the buffered ones unanswered,
/// which their senders read as an already-exited process.
fn release_cancellers(requests: &mut mpsc::Receiver<CancelRequest>) {
    requests.close();
    while let Ok(reply) = requests.try_recv() {
        drop(reply);
    }
}

/// Wait for exit, issuing a kill for every cancel request that arrives first.
///
/// Returns the exit result and whether a kill was issued.
async fn wait_or_kill(
    child: &mut Child,
    requests: &mut mpsc::Receiver<CancelRequest>,
    name: &str,
) -> (io::Result<ExitStatus>, bool) {
    let mut cancelled = false;
    let mut requests_open = true;

    loop {
        tokio::select! {
            exit = child.wait() => return (exit, cancelled),
            request = requests.recv(), if requests_open => match request {
                Some(reply) => {
                    let result = child.start_kill();
                    match &result {
                        Ok(()) => {
                            cancelled = true;
                            tracing::info!(command = %name, pid = ?child.id(), "Kill signal sent");
                        }
                        Err(e) => {
                            tracing::warn!(command = %name, error = %e, "Failed to signal process");
                        }
                    }
                    let _ = reply.send(result);
                }
                None => requests_open = false,
            },
        }
    }
}

fn final_status(
    name: &str,
    exit: &io::Result<ExitStatus>,
    cancelled: bool,
) -> (CommandStatus, Option<i32>) {
    match exit {
        Ok(status) if cancelled => (CommandStatus::Cancelled, status.code()),
        Err(_) if cancelled => (CommandStatus::Cancelled, None),
        Ok(status) if status.success() => (CommandStatus::Completed, Some(0)),
        Ok(status) => (CommandStatus::Failed, status.code()),
        Err(e) => {
            tracing::error!(command = %name, error = %e, "Failed to wait for process");
            (CommandStatus::Failed, None)
        }
    }
}

/// Persist a status change for record `id`. Failures (typically a deleted
/// record) are logged.
pub(crate) async fn record_status(
    store: &dyn CommandStore,
    id: DbId,
    name: &str,
    status: CommandStatus,
    exit_code: Option<i32>,
) {
    if let Err(e) = store.record_status(id, status, exit_code).await {
        tracing::warn!(command = %name, status = ?status, error = %e, "Failed to record status");
    }
}

// ---------------------------------------------------------------------------
// Output pumps
// ---------------------------------------------------------------------------

/// Copy one stream into the sink until EOF.
///
/// Only complete UTF-8 sequences are forwarded; a code point split across
/// reads is held back until the rest arrives. Whatever remains at EOF is
/// forwarded as-is. Chunks the sink rejects are logged and dropped.
async fn pump<R>(stream: Option<R>, sink: &OutputSink, stream_name: &'static str)
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return;
    };

    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(command = %sink.name(), stream = stream_name, error = %e, "Output read failed");
                break;
            }
        };

        pending.extend_from_slice(&buf[..n]);
        let ready = utf8_boundary(&pending);
        if ready > 0 {
            forward(sink, &pending[..ready], stream_name).await;
            pending.drain(..ready);
        }
    }

    if !pending.is_empty() {
        forward(sink, &pending, stream_name).await;
    }
}

async fn forward(sink: &OutputSink, chunk: &[u8], stream_name: &'static str) {
    if let Err(e) = sink.append(chunk).await {
        tracing::warn!(
            command = %sink.name(),
            stream = stream_name,
            bytes = chunk.len(),
            error = %e,
            "Dropping output chunk"
        );
    }
}

/// Length of the longest prefix of `bytes` that does not end mid code point.
///
/// Invalid sequences are not held back; the whole buffer is released and
/// decoded lossily downstream.
fn utf8_boundary(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => bytes.len(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
