//! Concurrency-safe index from job name to its live process handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::CancelError;

/// Capability to ask a running process to terminate.
///
/// Best effort: `Ok` means the signal was issued, not that the process has
/// exited. Implementations report [`CancelError::AlreadyExited`] when there
/// is nothing left to signal.
#[async_trait::async_trait]
pub trait Cancellable: Send + Sync {
    async fn cancel(&self) -> Result<(), CancelError>;
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// The live, cancellable execution unit backing a running job.
///
/// Cheap to clone; clones share the same cancellation capability. Every
/// handle gets a process-wide unique `id` so an entry can be removed only by
/// the owner that registered it.
#[derive(Clone)]
pub struct ProcessHandle {
    name: String,
    id: u64,
    canceller: Arc<dyn Cancellable>,
}

impl ProcessHandle {
    pub fn new(name: impl Into<String>, canceller: Arc<dyn Cancellable>) -> Self {
        Self {
            name: name.into(),
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            canceller,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn cancel(&self) -> Result<(), CancelError> {
        self.canceller.cancel().await
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Result of [`ProcessRegistry::remove_and_cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A live process was signalled and its entry removed.
    Cancelled,
    /// The entry existed but its process had already exited; entry removed.
    AlreadyExited,
    /// No entry for that name.
    NotRunning,
}

/// Mapping `name -> ProcessHandle`, shared by all workers, completion
/// watchers, and the canceller.
#[derive(Default)]
pub struct ProcessRegistry {
    entries: RwLock<HashMap<String, ProcessHandle>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the handle's name.
    ///
    /// Returns the replaced handle, if any. Name uniqueness of live jobs is
    /// enforced upstream, so a replacement is logged rather than rejected.
    pub async fn register(&self, handle: ProcessHandle) -> Option<ProcessHandle> {
        let name = handle.name.clone();
        let previous = self.entries.write().await.insert(name.clone(), handle);
        if let Some(prev) = &previous {
            tracing::warn!(command = %name, replaced_id = prev.id, "Replaced live process handle");
        }
        previous
    }

    pub async fn lookup(&self, name: &str) -> Option<ProcessHandle> {
        self.entries.read().await.get(name).cloned()
    }

    /// Remove the entry for `name` regardless of which handle it holds.
    pub async fn remove(&self, name: &str) -> Option<ProcessHandle> {
        self.entries.write().await.remove(name)
    }

    /// Remove the entry for `name` only if it still holds handle `id`.
    ///
    /// Returns `false` when the entry is gone or belongs to a newer handle,
    /// which makes a second removal a no-op.
    pub async fn remove_if_current(&self, name: &str, id: u64) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(name) {
            Some(handle) if handle.id == id => {
                entries.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Signal the process registered under `name` and drop its entry.
    ///
    /// - No entry: `Ok(NotRunning)`.
    /// - Signal issued: entry removed, `Ok(Cancelled)`.
    /// - Process already gone: entry removed, `Ok(AlreadyExited)`.
    /// - Any other signal failure is returned and the entry is kept; the
    ///   completion watcher still clears it when the process exits.
    pub async fn remove_and_cancel(&self, name: &str) -> Result<CancelOutcome, CancelError> {
        let Some(handle) = self.lookup(name).await else {
            return Ok(CancelOutcome::NotRunning);
        };

        let outcome = match handle.cancel().await {
            Ok(()) => CancelOutcome::Cancelled,
            Err(CancelError::AlreadyExited) => CancelOutcome::AlreadyExited,
            Err(e) => return Err(e),
        };

        self.remove_if_current(name, handle.id).await;
        Ok(outcome)
    }

    /// Clone of every live handle.
    pub async fn snapshot(&self) -> Vec<ProcessHandle> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
