use serde::{Deserialize, Serialize};

/// Observations that drive migration state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MigrationEvent {
    /// Running tasks of the same family were found
    ConflictFound(Vec<String>),
    /// The platform accepted the launch and returned a task identifier
    Launched(String),
    /// The platform returned no task
    LaunchRejected(String),
    /// The task reported RUNNING
    ObservedRunning,
    /// The task reported STOPPED
    ObservedStopped(Option<i32>),
    /// A polling phase used up its attempts
    BudgetExhausted,
    /// The caller cancelled polling
    Cancel,
}

impl MigrationEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConflictFound(_) => "conflict_found",
            Self::Launched(_) => "launched",
            Self::LaunchRejected(_) => "launch_rejected",
            Self::ObservedRunning => "observed_running",
            Self::ObservedStopped(_) => "observed_stopped",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancel => "cancel",
        }
    }

    pub fn task_arn(&self) -> Option<&str> {
        match self {
            Self::Launched(arn) => Some(arn),
            _ => None,
        }
    }
}
