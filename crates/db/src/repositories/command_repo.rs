//! Repository for the `commands` table.

use scripthub_core::types::DbId;
use sqlx::PgPool;

use crate::models::command::{Command, CreateCommand};

/// Column list for `commands` SELECT queries.
const COLUMNS: &str = "id, name, script, output, status_id, exit_code, created_at, updated_at";

/// Provides CRUD operations plus output appends for commands.
pub struct CommandRepo;

impl CommandRepo {
    /// Insert a new command in `pending` status, returning its ID.
    ///
    /// A duplicate name surfaces as a unique violation on `uq_commands_name`.
    pub async fn create(pool: &PgPool, dto: &CreateCommand) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar("INSERT INTO commands (name, script) VALUES ($1, $2) RETURNING id")
            .bind(&dto.name)
            .bind(&dto.script)
            .fetch_one(pool)
            .await
    }

    /// Find a command by its unique name.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Command>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM commands WHERE name = $1");
        sqlx::query_as::<_, Command>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// List all commands ordered by ID.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Command>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM commands ORDER BY id");
        sqlx::query_as::<_, Command>(&query).fetch_all(pool).await
    }

    /// Append `chunk` to the output of command `id`.
    ///
    /// Reads the current output under a row lock (`FOR UPDATE`), concatenates
    /// and writes back in one transaction, so two writers of the same row
    /// serialize instead of losing each other's chunk. Returns
    /// [`sqlx::Error::RowNotFound`] when the command does not exist.
    pub async fn append_output(pool: &PgPool, id: DbId, chunk: &str) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT output FROM commands WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(mut output) = current else {
            return Err(sqlx::Error::RowNotFound);
        };

        output.push_str(chunk);
        sqlx::query("UPDATE commands SET output = $2 WHERE id = $1")
            .bind(id)
            .bind(&output)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    /// Set status and exit code. Returns `false` if no row matched.
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status_id: i16,
        exit_code: Option<i32>,
    ) -> Result<bool, sqlx::Error> {
        let rows = sqlx::query("UPDATE commands SET status_id = $2, exit_code = $3 WHERE id = $1")
            .bind(id)
            .bind(status_id)
            .bind(exit_code)
            .execute(pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Delete a command by name. Returns `false` if nothing was deleted.
    pub async fn delete_by_name(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
        let rows = sqlx::query("DELETE FROM commands WHERE name = $1")
            .bind(name)
            .execute(pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }
}
