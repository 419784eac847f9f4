use super::error::{MigrationError, MigrationResult};
use super::events::MigrationEvent;
use super::states::MigrationState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// One recorded transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub from: MigrationState,
    pub to: MigrationState,
    pub event: String,
    pub at: DateTime<Utc>,
}

/// State machine of a single migration invocation, with its transition history
#[derive(Debug, Clone)]
pub struct MigrationStateMachine {
    family: String,
    current: MigrationState,
    task_arn: Option<String>,
    history: Vec<StateTransition>,
}

impl MigrationStateMachine {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            current: MigrationState::default(),
            task_arn: None,
            history: Vec::new(),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn current_state(&self) -> MigrationState {
        self.current
    }

    pub fn task_arn(&self) -> Option<&str> {
        self.task_arn.as_deref()
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    pub fn into_history(self) -> Vec<StateTransition> {
        self.history
    }

    /// Apply `event`, recording the transition at `at`
    pub fn transition(
        &mut self,
        event: &MigrationEvent,
        at: DateTime<Utc>,
    ) -> MigrationResult<MigrationState> {
        let target = determine_target_state(self.current, event)?;

        if let Some(arn) = event.task_arn() {
            self.task_arn = Some(arn.to_string());
        }

        debug!(
            family = %self.family,
            from = %self.current,
            to = %target,
            event = event.event_type(),
            "🔄 Migration state transition"
        );

        self.history.push(StateTransition {
            from: self.current,
            to: target,
            event: event.event_type().to_string(),
            at,
        });
        self.current = target;
        Ok(target)
    }
}

/// Determine the target state based on current state and event
pub fn determine_target_state(
    current: MigrationState,
    event: &MigrationEvent,
) -> MigrationResult<MigrationState> {
    let target = match (current, event) {
        // Pre-launch
        (MigrationState::Idle, MigrationEvent::ConflictFound(_)) => {
            MigrationState::ConflictDetected
        }
        (MigrationState::Idle, MigrationEvent::LaunchRejected(_)) => MigrationState::LaunchFailed,
        (MigrationState::Idle, MigrationEvent::Launched(_)) => MigrationState::Submitted,

        // Observation
        (MigrationState::Submitted, MigrationEvent::ObservedRunning) => MigrationState::Running,
        // A fast task may already be stopped the first time it is seen
        (
            MigrationState::Submitted | MigrationState::Running,
            MigrationEvent::ObservedStopped(exit_code),
        ) => MigrationState::Stopped {
            exit_code: *exit_code,
        },

        // Budget and cancellation
        (
            MigrationState::Submitted | MigrationState::Running,
            MigrationEvent::BudgetExhausted,
        ) => MigrationState::TimedOut,
        (MigrationState::Submitted | MigrationState::Running, MigrationEvent::Cancel) => {
            MigrationState::Cancelled
        }

        (from, _) => {
            return Err(MigrationError::InvalidTransition {
                from: from.to_string(),
                event: event.event_type().to_string(),
            })
        }
    };

    Ok(target)
}
