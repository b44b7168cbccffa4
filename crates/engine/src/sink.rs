//! Per-job output sink.
//!
//! Both pumps of a job (stdout and stderr) write through the same sink. The
//! sink serializes their appends so each chunk lands as one
//! read-concatenate-write unit, even against a store whose own append is not
//! atomic.

use std::sync::Arc;

use scripthub_core::error::CoreError;
use scripthub_core::store::CommandStore;
use scripthub_core::types::DbId;
use tokio::sync::Mutex;

pub struct OutputSink {
    id: DbId,
    name: String,
    store: Arc<dyn CommandStore>,
    gate: Mutex<()>,
}

impl OutputSink {
    pub fn new(id: DbId, name: impl Into<String>, store: Arc<dyn CommandStore>) -> Self {
        Self {
            id,
            name: name.into(),
            store,
            gate: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append `chunk` to the job's stored output.
    ///
    /// Writes address the record by ID, so a record deleted and re-created
    /// under the same name is never written by this sink. Empty chunks are a
    /// no-op. Bytes are decoded lossily; callers that
    /// care about split code points hand in complete UTF-8 only.
    pub async fn append(&self, chunk: &[u8]) -> Result<(), CoreError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(chunk);

        let _guard = self.gate.lock().await;
        self.store.append_output(self.id, &text).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use scripthub_core::command::CommandStatus;
    use scripthub_core::memory::MemoryCommandStore;
    use scripthub_core::store::CommandRecord;
    use scripthub_core::types::DbId;

    use super::*;

    /// Store whose append reads, yields, then writes back. Two unsynchronized
    /// appends to the same record lose a chunk.
    #[derive(Default)]
    struct RacyStore {
        outputs: StdMutex<HashMap<DbId, String>>,
    }

    const RACY_ID: DbId = 1;

    #[async_trait::async_trait]
    impl CommandStore for RacyStore {
        async fn create(&self, _name: &str, _script: &str) -> Result<DbId, CoreError> {
            self.outputs.lock().unwrap().insert(RACY_ID, String::new());
            Ok(RACY_ID)
        }

        async fn get_by_name(&self, name: &str) -> Result<CommandRecord, CoreError> {
            Err(CoreError::command_not_found(name))
        }

        async fn list_all(&self) -> Result<Vec<CommandRecord>, CoreError> {
            Ok(Vec::new())
        }

        async fn append_output(&self, id: DbId, chunk: &str) -> Result<(), CoreError> {
            let current = self
                .outputs
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| CoreError::command_id_not_found(id))?;
            tokio::task::yield_now().await;
            self.outputs.lock().unwrap().insert(id, current + chunk);
            Ok(())
        }

        async fn record_status(
            &self,
            _id: DbId,
            _status: CommandStatus,
            _exit_code: Option<i32>,
        ) -> Result<(), CoreError> {
            Ok(())
        }

        async fn delete_by_name(&self, _name: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn appends_concatenate_in_call_order() {
        let store = Arc::new(MemoryCommandStore::new());
        let id = store.create("job", "echo").await.unwrap();
        let sink = OutputSink::new(id, "job", store.clone());

        sink.append(b"hello ").await.unwrap();
        sink.append(b"").await.unwrap();
        sink.append(b"world\n").await.unwrap();

        assert_eq!(store.output_of("job").await.as_deref(), Some("hello world\n"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn interleaved_writers_lose_nothing() {
        let store = Arc::new(RacyStore::default());
        let id = store.create("job", "noisy").await.unwrap();
        let sink = Arc::new(OutputSink::new(id, "job", store.clone()));

        let mut writers = Vec::new();
        for stream in ["o", "e"] {
            let sink = Arc::clone(&sink);
            writers.push(tokio::spawn(async move {
                for i in 0..50 {
                    sink.append(format!("{stream}{i:02};").as_bytes())
                        .await
                        .unwrap();
                }
            }));
        }
        for writer in writers {
            writer.await.unwrap();
        }

        let output = store.outputs.lock().unwrap().get(&id).cloned().unwrap();
        assert_eq!(output.len(), 100 * 4);
        // Each writer's chunks appear whole and in the order it appended them.
        for stream in ["o", "e"] {
            let positions: Vec<usize> = (0..50)
                .map(|i| {
                    output
                        .find(&format!("{stream}{i:02};"))
                        .unwrap_or_else(|| panic!("missing {stream}{i:02}"))
                })
                .collect();
            assert!(
                positions.windows(2).all(|w| w[0] < w[1]),
                "{stream} chunks out of order: {output}"
            );
        }
    }

    #[tokio::test]
    async fn missing_record_surfaces_not_found() {
        let store = Arc::new(MemoryCommandStore::new());
        let sink = OutputSink::new(99, "ghost", store);
        assert!(sink.append(b"x").await.unwrap_err().is_not_found());
    }
}
