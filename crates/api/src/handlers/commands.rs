//! Handlers for the `/commands` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use scripthub_core::store::CommandRecord;
use scripthub_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for creating a command.
///
/// Missing fields default to empty and are rejected by validation.
#[derive(Debug, Deserialize)]
pub struct CreateCommandRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub script: String,
}

/// Response body for a created command.
#[derive(Debug, Serialize)]
pub struct CreatedCommand {
    pub command_id: DbId,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/commands
///
/// Persist the command and queue it for execution. Responds as soon as the
/// job is accepted; output accumulates on the record in the background.
/// A body that is not a JSON object answers 400 `BAD_REQUEST`.
pub async fn create_command(
    State(state): State<AppState>,
    payload: Result<Json<CreateCommandRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedCommand>>)> {
    let Json(input) = payload?;
    let command_id = state.commands.submit(&input.name, &input.script).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedCommand { command_id },
        }),
    ))
}

/// GET /api/v1/commands
pub async fn list_commands(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<CommandRecord>>>> {
    let commands = state.store.list_all().await?;
    if commands.is_empty() {
        return Err(AppError::NotFound("No commands found".to_string()));
    }
    Ok(Json(DataResponse { data: commands }))
}

/// GET /api/v1/commands/{name}
pub async fn get_command(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<DataResponse<CommandRecord>>> {
    let command = state.store.get_by_name(&name).await?;
    Ok(Json(DataResponse { data: command }))
}

/// DELETE /api/v1/commands/{name}
///
/// Removes the record and stops the process if it is still running.
pub async fn delete_command(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<StatusCode> {
    state.commands.cancel(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
