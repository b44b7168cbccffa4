use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} '{name}'")]
    NotFound { entity: &'static str, name: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing command record.
    pub fn command_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "command",
            name: name.into(),
        }
    }

    /// Shorthand for a command record that no longer exists under `id`.
    pub fn command_id_not_found(id: DbId) -> Self {
        Self::NotFound {
            entity: "command",
            name: format!("#{id}"),
        }
    }

    /// True for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
