//! In-memory [`CommandStore`] used by engine and request-layer tests and by
//! anything that needs the store contract without a database.

use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::command::CommandStatus;
use crate::error::CoreError;
use crate::store::{CommandRecord, CommandStore};
use crate::types::DbId;

#[derive(Default)]
struct Inner {
    next_id: DbId,
    records: BTreeMap<String, CommandRecord>,
}

impl Inner {
    fn record_mut(&mut self, id: DbId) -> Option<&mut CommandRecord> {
        self.records.values_mut().find(|r| r.id == id)
    }
}

/// A [`CommandStore`] backed by a mutex-guarded map.
///
/// Every operation holds the lock for its whole duration, so `append_output`
/// is atomic the same way the database transaction is.
#[derive(Default)]
pub struct MemoryCommandStore {
    inner: Mutex<Inner>,
}

impl MemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current output for `name`, or `None` if no record exists.
    pub async fn output_of(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .await
            .records
            .get(name)
            .map(|r| r.output.clone())
    }

    /// Current status for `name`, or `None` if no record exists.
    pub async fn status_of(&self, name: &str) -> Option<CommandStatus> {
        self.inner
            .lock()
            .await
            .records
            .get(name)
            .map(|r| r.status)
    }
}

#[async_trait::async_trait]
impl CommandStore for MemoryCommandStore {
    async fn create(&self, name: &str, script: &str) -> Result<DbId, CoreError> {
        let mut inner = self.inner.lock().await;
        if inner.records.contains_key(name) {
            return Err(CoreError::Conflict(format!(
                "Command '{name}' already exists"
            )));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let now = Utc::now();
        inner.records.insert(
            name.to_string(),
            CommandRecord {
                id,
                name: name.to_string(),
                script: script.to_string(),
                output: String::new(),
                status: CommandStatus::Pending,
                exit_code: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn get_by_name(&self, name: &str) -> Result<CommandRecord, CoreError> {
        self.inner
            .lock()
            .await
            .records
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::command_not_found(name))
    }

    async fn list_all(&self) -> Result<Vec<CommandRecord>, CoreError> {
        let mut all: Vec<_> = self.inner.lock().await.records.values().cloned().collect();
        all.sort_by_key(|r| r.id);
        Ok(all)
    }

    async fn append_output(&self, id: DbId, chunk: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .record_mut(id)
            .ok_or_else(|| CoreError::command_id_not_found(id))?;
        record.output.push_str(chunk);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn record_status(
        &self,
        id: DbId,
        status: CommandStatus,
        exit_code: Option<i32>,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .record_mut(id)
            .ok_or_else(|| CoreError::command_id_not_found(id))?;
        record.status = status;
        record.exit_code = exit_code;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_by_name(&self, name: &str) -> Result<(), CoreError> {
        self.inner
            .lock()
            .await
            .records
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CoreError::command_not_found(name))
    }
}
