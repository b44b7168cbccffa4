//! Bounded hand-off channel between submitters and workers.
//!
//! Many producers, many consumers. Workers share the single receiver behind
//! an async mutex. Closing the queue drops the sender, so workers keep
//! receiving already-buffered jobs and only then observe `None`.

use scripthub_core::types::DbId;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

/// A named script-execution request for the stored record `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: DbId,
    pub name: String,
    pub script: String,
}

impl Job {
    pub fn new(id: DbId, name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            script: script.into(),
        }
    }
}

/// A queued job plus, in rendezvous mode, the submitter's wake-up channel.
struct Envelope {
    job: Job,
    received: Option<oneshot::Sender<()>>,
}

/// FIFO job queue with configurable capacity.
///
/// A capacity of zero means synchronous hand-off: [`JobQueue::submit`]
/// returns only once a worker has taken the job.
pub struct JobQueue {
    sender: Mutex<Option<mpsc::Sender<Envelope>>>,
    receiver: Mutex<mpsc::Receiver<Envelope>>,
    closed: CancellationToken,
    rendezvous: bool,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(rx),
            closed: CancellationToken::new(),
            rendezvous: capacity == 0,
        }
    }

    /// Enqueue `job`, waiting for space (or for a worker, in rendezvous mode).
    ///
    /// Fails with [`EngineError::Shutdown`] if the queue is closed before or
    /// while waiting.
    pub async fn submit(&self, job: Job) -> Result<(), EngineError> {
        let Some(tx) = self.sender.lock().await.clone() else {
            return Err(EngineError::Shutdown);
        };

        let (received_tx, received_rx) = if self.rendezvous {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let envelope = Envelope {
            job,
            received: received_tx,
        };

        tokio::select! {
            sent = tx.send(envelope) => sent.map_err(|_| EngineError::Shutdown)?,
            () = self.closed.cancelled() => return Err(EngineError::Shutdown),
        }
        drop(tx);

        if let Some(received) = received_rx {
            // Dropped unreceived only when pending jobs are discarded.
            received.await.map_err(|_| EngineError::Shutdown)?;
        }
        Ok(())
    }

    /// Take the next job, or `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<Job> {
        let envelope = self.receiver.lock().await.recv().await?;
        if let Some(received) = envelope.received {
            let _ = received.send(());
        }
        Some(envelope.job)
    }

    /// Stop accepting jobs. Already-buffered jobs stay receivable.
    pub async fn close(&self) {
        self.closed.cancel();
        self.sender.lock().await.take();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Drop every buffered job without running it. Returns how many were dropped.
    ///
    /// Only meaningful after [`close`](Self::close) once no worker will
    /// receive again; rendezvous submitters blocked on these jobs fail with
    /// [`EngineError::Shutdown`].
    pub async fn discard_pending(&self) -> usize {
        let mut rx = self.receiver.lock().await;
        let mut dropped = 0;
        while let Ok(envelope) = rx.try_recv() {
            tracing::warn!(command = %envelope.job.name, "Discarding queued job at shutdown");
            dropped += 1;
        }
        dropped
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn jobs_come_out_in_fifo_order() {
        let queue = JobQueue::new(4);
        for i in 0..3 {
            queue.submit(Job::new(i, format!("job{i}"), "true")).await.unwrap();
        }
        for i in 0..3 {
            assert_eq!(queue.recv().await.unwrap().name, format!("job{i}"));
        }
    }

    #[tokio::test]
    async fn close_drains_buffered_jobs_then_ends() {
        let queue = JobQueue::new(4);
        queue.submit(Job::new(1, "a", "true")).await.unwrap();
        queue.submit(Job::new(2, "b", "true")).await.unwrap();
        queue.close().await;

        assert_eq!(queue.recv().await.unwrap().name, "a");
        assert_eq!(queue.recv().await.unwrap().name, "b");
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn submit_after_close_fails() {
        let queue = JobQueue::new(1);
        queue.close().await;
        assert!(queue.is_closed());
        assert_matches!(
            queue.submit(Job::new(1, "late", "true")).await,
            Err(EngineError::Shutdown)
        );
    }

    #[tokio::test]
    async fn blocked_submit_fails_when_closed() {
        let queue = Arc::new(JobQueue::new(1));
        queue.submit(Job::new(1, "fills", "true")).await.unwrap();

        let blocked = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.submit(Job::new(1, "waits", "true")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        queue.close().await;
        let result = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("submit should unblock")
            .unwrap();
        assert_matches!(result, Err(EngineError::Shutdown));
    }

    #[tokio::test]
    async fn rendezvous_submit_waits_for_a_receiver() {
        let queue = Arc::new(JobQueue::new(0));

        let submit = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.submit(Job::new(1, "handoff", "true")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!submit.is_finished(), "no worker has taken the job yet");

        assert_eq!(queue.recv().await.unwrap().name, "handoff");
        submit.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn discarding_fails_rendezvous_submitter() {
        let queue = Arc::new(JobQueue::new(0));

        let submit = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.submit(Job::new(1, "orphan", "true")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        queue.close().await;
        assert_eq!(queue.discard_pending().await, 1);
        assert_matches!(submit.await.unwrap(), Err(EngineError::Shutdown));
    }
}
