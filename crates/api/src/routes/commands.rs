use axum::routing::get;
use axum::Router;

use crate::handlers::commands;
use crate::state::AppState;

/// Routes mounted at `/commands`.
///
/// ```text
/// POST   /                -> create_command
/// GET    /                -> list_commands
/// GET    /{name}          -> get_command
/// DELETE /{name}          -> delete_command
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(commands::list_commands).post(commands::create_command),
        )
        .route(
            "/{name}",
            get(commands::get_command).delete(commands::delete_command),
        )
}
