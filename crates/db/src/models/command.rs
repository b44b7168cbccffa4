//! Command entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scripthub_core::command::CommandStatus;
use scripthub_core::store::CommandRecord;
use scripthub_core::types::{DbId, Timestamp};

/// A row from the `commands` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Command {
    pub id: DbId,
    pub name: String,
    pub script: String,
    pub output: String,
    pub status_id: i16,
    pub exit_code: Option<i32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new command.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommand {
    pub name: String,
    pub script: String,
}

impl From<Command> for CommandRecord {
    fn from(row: Command) -> Self {
        // Out-of-range ids read as `Failed`.
        let status = CommandStatus::from_id(row.status_id).unwrap_or(CommandStatus::Failed);
        Self {
            id: row.id,
            name: row.name,
            script: row.script,
            output: row.output,
            status,
            exit_code: row.exit_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
