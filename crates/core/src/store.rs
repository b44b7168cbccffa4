//! Persistence seam for command records.
//!
//! The execution engine only ever calls [`CommandStore::append_output`] and
//! [`CommandStore::record_status`]; the request layer uses the rest. The
//! PostgreSQL implementation lives in `scripthub-db`, an in-memory one in
//! [`crate::memory`].

use serde::Serialize;

use crate::command::CommandStatus;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// A persisted command together with its accumulated output.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    pub id: DbId,
    pub name: String,
    pub script: String,
    pub output: String,
    pub status: CommandStatus,
    pub exit_code: Option<i32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Persistence operations consumed by the engine and the request layer.
///
/// The engine writes by record ID rather than by name. A name can be
/// deleted and created again while an earlier run is still exiting, and that
/// run's late writes must miss the new record.
///
/// Error contract:
/// - `create` fails with [`CoreError::Conflict`] when the name is taken.
/// - Operations addressing a single record fail with [`CoreError::NotFound`]
///   when it does not exist.
/// - `list_all` returns an empty vector rather than an error.
#[async_trait::async_trait]
pub trait CommandStore: Send + Sync {
    /// Insert a new record in `pending` status and return its ID.
    async fn create(&self, name: &str, script: &str) -> Result<DbId, CoreError>;

    /// Fetch one record by name.
    async fn get_by_name(&self, name: &str) -> Result<CommandRecord, CoreError>;

    /// All records ordered by ID.
    async fn list_all(&self) -> Result<Vec<CommandRecord>, CoreError>;

    /// Append `chunk` to record `id`'s output as one read-modify-write unit.
    async fn append_output(&self, id: DbId, chunk: &str) -> Result<(), CoreError>;

    /// Update record `id`'s lifecycle status (and exit code, when known).
    async fn record_status(
        &self,
        id: DbId,
        status: CommandStatus,
        exit_code: Option<i32>,
    ) -> Result<(), CoreError>;

    /// Delete one record by name.
    async fn delete_by_name(&self, name: &str) -> Result<(), CoreError>;
}
