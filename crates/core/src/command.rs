//! Command validation rules, script splitting, and the lifecycle status model.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a command name.
pub const MAX_NAME_LEN: usize = 128;

/// Maximum length of a command script.
pub const MAX_SCRIPT_LEN: usize = 4096;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a command record.
///
/// Discriminants match the SMALLINT stored in `commands.status_id`.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// Record created, job queued but not yet started.
    Pending = 1,
    /// Process started and not yet observed to exit.
    Running = 2,
    /// Process exited with code 0.
    Completed = 3,
    /// Non-zero exit, signal termination, or the process never started.
    Failed = 4,
    /// Cancellation was requested before the process exited.
    Cancelled = 5,
}

impl CommandStatus {
    /// Return the database status ID.
    pub fn id(self) -> i16 {
        self as i16
    }

    /// Map a database status ID back to a status. Unknown IDs yield `None`.
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Running),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            5 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether this status is final for one execution.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Script splitting
// ---------------------------------------------------------------------------

/// A script split into its executable and argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptParts<'a> {
    pub program: &'a str,
    pub args: Vec<&'a str>,
}

/// Split a script on whitespace into program and arguments.
///
/// No shell expansion and no quoting: `echo "a b"` yields the arguments
/// `"a` and `b"`. Returns `None` for a blank script.
pub fn split_script(script: &str) -> Option<ScriptParts<'_>> {
    let mut parts = script.split_whitespace();
    let program = parts.next()?;
    Some(ScriptParts {
        program,
        args: parts.collect(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a command name.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_NAME_LEN` characters.
/// - Must contain only alphanumeric, hyphen, underscore, or dot characters.
pub fn validate_command_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "Command name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Command name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CoreError::Validation(
            "Command name may only contain alphanumeric, hyphen, underscore, or dot characters"
                .to_string(),
        ));
    }
    Ok(())
}

/// Validate a command script: non-blank and within `MAX_SCRIPT_LEN`.
pub fn validate_script(script: &str) -> Result<(), CoreError> {
    if script.trim().is_empty() {
        return Err(CoreError::Validation(
            "Command script must not be empty".to_string(),
        ));
    }
    if script.len() > MAX_SCRIPT_LEN {
        return Err(CoreError::Validation(format!(
            "Command script must not exceed {MAX_SCRIPT_LEN} bytes"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn split_simple_program() {
        let parts = split_script("pwd").unwrap();
        assert_eq!(parts.program, "pwd");
        assert!(parts.args.is_empty());
    }

    #[test]
    fn split_collapses_repeated_whitespace() {
        let parts = split_script("  sleep \t 5  ").unwrap();
        assert_eq!(parts.program, "sleep");
        assert_eq!(parts.args, vec!["5"]);
    }

    #[test]
    fn split_does_not_honour_quotes() {
        let parts = split_script(r#"echo "a b""#).unwrap();
        assert_eq!(parts.args, vec![r#""a"#, r#"b""#]);
    }

    #[test]
    fn split_blank_is_none() {
        assert!(split_script("   ").is_none());
        assert!(split_script("").is_none());
    }

    #[test]
    fn valid_names() {
        assert!(validate_command_name("pwd").is_ok());
        assert!(validate_command_name("build-1.2_final").is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        assert_matches!(validate_command_name(""), Err(CoreError::Validation(_)));
    }

    #[test]
    fn long_name_rejected() {
        let name = "a".repeat(MAX_NAME_LEN + 1);
        assert_matches!(validate_command_name(&name), Err(CoreError::Validation(_)));
    }

    #[test]
    fn name_with_slash_rejected() {
        assert_matches!(
            validate_command_name("../etc"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn blank_script_rejected() {
        assert_matches!(validate_script(" \n"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn oversized_script_rejected() {
        let script = "x".repeat(MAX_SCRIPT_LEN + 1);
        assert_matches!(validate_script(&script), Err(CoreError::Validation(_)));
    }

    #[test]
    fn status_ids_round_trip() {
        for status in [
            CommandStatus::Pending,
            CommandStatus::Running,
            CommandStatus::Completed,
            CommandStatus::Failed,
            CommandStatus::Cancelled,
        ] {
            assert_eq!(CommandStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(CommandStatus::from_id(0), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!CommandStatus::Pending.is_terminal());
        assert!(!CommandStatus::Running.is_terminal());
        assert!(CommandStatus::Completed.is_terminal());
        assert!(CommandStatus::Failed.is_terminal());
        assert!(CommandStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&CommandStatus::Cancelled).unwrap();
        assert_eq!(json, r#""cancelled""#);
    }
}
