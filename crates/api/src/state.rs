use std::sync::Arc;

use scripthub_core::store::CommandStore;

use crate::config::ServerConfig;
use crate::service::CommandService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database pool, probed by `/health`. `None` when running over a
    /// non-database store.
    pub pool: Option<scripthub_db::DbPool>,
    /// Command persistence used by the read endpoints.
    pub store: Arc<dyn CommandStore>,
    /// Submitter and canceller.
    pub commands: Arc<CommandService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
