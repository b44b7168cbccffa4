//! [`CommandStore`] implementation over [`CommandRepo`].

use scripthub_core::command::CommandStatus;
use scripthub_core::error::CoreError;
use scripthub_core::store::{CommandRecord, CommandStore};
use scripthub_core::types::DbId;

use crate::models::command::CreateCommand;
use crate::repositories::CommandRepo;
use crate::DbPool;

/// PostgreSQL-backed command store.
#[derive(Clone)]
pub struct PgCommandStore {
    pool: DbPool,
}

impl PgCommandStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a sqlx error onto the domain taxonomy.
///
/// - `RowNotFound` becomes `NotFound` for `name`.
/// - Unique violations (SQLSTATE 23505) become `Conflict`.
/// - Everything else becomes `Internal`.
fn classify(err: sqlx::Error, name: &str) -> CoreError {
    match err {
        sqlx::Error::RowNotFound => CoreError::command_not_found(name),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            CoreError::Conflict(format!("Command '{name}' already exists"))
        }
        other => {
            tracing::error!(command = %name, error = %other, "Database error");
            CoreError::Internal(other.to_string())
        }
    }
}

#[async_trait::async_trait]
impl CommandStore for PgCommandStore {
    async fn create(&self, name: &str, script: &str) -> Result<DbId, CoreError> {
        let dto = CreateCommand {
            name: name.to_string(),
            script: script.to_string(),
        };
        CommandRepo::create(&self.pool, &dto)
            .await
            .map_err(|e| classify(e, name))
    }

    async fn get_by_name(&self, name: &str) -> Result<CommandRecord, CoreError> {
        CommandRepo::find_by_name(&self.pool, name)
            .await
            .map_err(|e| classify(e, name))?
            .map(CommandRecord::from)
            .ok_or_else(|| CoreError::command_not_found(name))
    }

    async fn list_all(&self) -> Result<Vec<CommandRecord>, CoreError> {
        let rows = CommandRepo::list_all(&self.pool)
            .await
            .map_err(|e| classify(e, "*"))?;
        Ok(rows.into_iter().map(CommandRecord::from).collect())
    }

    async fn append_output(&self, id: DbId, chunk: &str) -> Result<(), CoreError> {
        CommandRepo::append_output(&self.pool, id, chunk)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => CoreError::command_id_not_found(id),
                other => classify(other, &format!("#{id}")),
            })
    }

    async fn record_status(
        &self,
        id: DbId,
        status: CommandStatus,
        exit_code: Option<i32>,
    ) -> Result<(), CoreError> {
        let updated = CommandRepo::set_status(&self.pool, id, status.id(), exit_code)
            .await
            .map_err(|e| classify(e, &format!("#{id}")))?;
        if !updated {
            return Err(CoreError::command_id_not_found(id));
        }
        Ok(())
    }

    async fn delete_by_name(&self, name: &str) -> Result<(), CoreError> {
        let deleted = CommandRepo::delete_by_name(&self.pool, name)
            .await
            .map_err(|e| classify(e, name))?;
        if !deleted {
            return Err(CoreError::command_not_found(name));
        }
        Ok(())
    }
}
