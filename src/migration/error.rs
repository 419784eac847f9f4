use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Polling phase of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollPhase {
    AwaitingRunning,
    AwaitingStopped,
}

impl PollPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingRunning => "awaiting-running",
            Self::AwaitingStopped => "awaiting-stopped",
        }
    }
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failures of a migration run. Each kind is distinct so callers can
/// tell operator-recoverable conditions (conflict, timeout) from application
/// failures that need investigation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("Migration task of family '{family}' is already running: {}", .task_arns.join(", "))]
    ConflictDetected {
        family: String,
        task_arns: Vec<String>,
    },

    #[error("Failed to launch migration task of family '{family}': {reason}")]
    LaunchFailed { family: String, reason: String },

    #[error("Migration task did not leave phase {phase} within {attempts} attempts")]
    TimedOut { phase: PollPhase, attempts: u32 },

    #[error(
        "Migration task {task_arn} failed with exit code {}{}",
        display_exit_code(.exit_code),
        failure_detail(.reason, .log_hint)
    )]
    MigrationFailed {
        task_arn: String,
        exit_code: Option<i32>,
        reason: Option<String>,
        log_hint: Option<String>,
    },

    #[error("Platform query {operation} failed: {message}")]
    UpstreamQueryError { operation: String, message: String },

    #[error("Invalid migration state transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Migration run cancelled during phase {phase}")]
    Cancelled { phase: PollPhase },
}

impl MigrationError {
    /// Conditions an operator clears by waiting and re-running
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConflictDetected { .. } | Self::TimedOut { .. } | Self::Cancelled { .. }
        )
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::MigrationFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

pub type MigrationResult<T> = Result<T, MigrationError>;

fn display_exit_code(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(|| "none".to_string(), |code| code.to_string())
}

fn failure_detail(reason: &Option<String>, log_hint: &Option<String>) -> String {
    let reason = reason
        .as_ref()
        .map(|reason| format!(" ({reason})"))
        .unwrap_or_default();
    match log_hint {
        Some(hint) => format!("{reason}; see logs at {hint}"),
        None => format!("{reason}; see the task's log stream"),
    }
}
