//! Submit and cancel commands on behalf of HTTP handlers.
//!
//! [`CommandService`] is the only caller of the engine. It validates and
//! persists a command before handing it to the queue, and pairs record
//! deletion with cancellation of the live process.

use std::sync::Arc;

use scripthub_core::command::{split_script, validate_command_name, validate_script};
use scripthub_core::error::CoreError;
use scripthub_core::store::CommandStore;
use scripthub_core::types::DbId;
use scripthub_engine::process::resolve_executable;
use scripthub_engine::{CancelOutcome, Engine, Job};

use crate::error::AppResult;

pub struct CommandService {
    store: Arc<dyn CommandStore>,
    engine: Arc<Engine>,
}

impl CommandService {
    pub fn new(store: Arc<dyn CommandStore>, engine: Arc<Engine>) -> Self {
        Self { store, engine }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Validate, persist, and enqueue a command. Returns the new record ID.
    ///
    /// - Blank or malformed name/script, or an executable that is not on
    ///   `PATH`: `CoreError::Validation`, nothing persisted.
    /// - Name already taken: `CoreError::Conflict`, nothing enqueued.
    /// - Engine shutting down: `EngineError::Shutdown`; the just-created
    ///   record is removed again.
    pub async fn submit(&self, name: &str, script: &str) -> AppResult<DbId> {
        validate_command_name(name)?;
        validate_script(script)?;

        let parts = split_script(script)
            .ok_or_else(|| CoreError::Validation("Command script must not be empty".into()))?;
        if let Err(e) = resolve_executable(parts.program) {
            tracing::info!(command = %name, program = parts.program, error = %e, "Rejected unresolvable executable");
            return Err(CoreError::Validation(format!(
                "Executable '{}' not found",
                parts.program
            ))
            .into());
        }

        let id = self.store.create(name, script).await?;

        if let Err(e) = self.engine.submit(Job::new(id, name, script)).await {
            if let Err(cleanup) = self.store.delete_by_name(name).await {
                tracing::warn!(command = %name, error = %cleanup, "Failed to remove unqueued command");
            }
            return Err(e.into());
        }

        tracing::info!(command = %name, command_id = id, "Command submitted");
        Ok(id)
    }

    /// Delete the record for `name`, then stop its process if one is running.
    ///
    /// A missing record is `CoreError::NotFound`. A record without a live
    /// process is not an error.
    pub async fn cancel(&self, name: &str) -> AppResult<CancelOutcome> {
        self.store.delete_by_name(name).await?;
        let outcome = self.engine.cancel(name).await?;
        tracing::info!(command = %name, outcome = ?outcome, "Command deleted");
        Ok(outcome)
    }
}
