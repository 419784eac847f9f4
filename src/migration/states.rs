use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one migration task invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum MigrationState {
    /// Nothing submitted yet
    #[default]
    Idle,
    /// Launch accepted, task not yet observed running
    Submitted,
    /// Task observed running
    Running,
    /// Task stopped; the exit code of its first container, when reported
    Stopped { exit_code: Option<i32> },
    /// A polling budget ran out
    TimedOut,
    /// Another task of the family was already running
    ConflictDetected,
    /// The platform did not start a task
    LaunchFailed,
    /// Polling was cancelled by the caller
    Cancelled,
}

impl MigrationState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Stopped { .. }
                | Self::TimedOut
                | Self::ConflictDetected
                | Self::LaunchFailed
                | Self::Cancelled
        )
    }

    /// Check if a task exists on the platform in this state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitted | Self::Running)
    }

    /// Stopped with exit code zero
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stopped { exit_code: Some(0) })
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Submitted => write!(f, "submitted"),
            Self::Running => write!(f, "running"),
            Self::Stopped { exit_code: Some(code) } => write!(f, "stopped({code})"),
            Self::Stopped { exit_code: None } => write!(f, "stopped"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::ConflictDetected => write!(f, "conflict_detected"),
            Self::LaunchFailed => write!(f, "launch_failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
