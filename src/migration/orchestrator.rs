//! # Migration Task Orchestrator
//!
//! Runs the one-shot schema migration task:
//!
//! 1. dry-run or disabled execution short-circuits without touching the platform
//! 2. running tasks of the same family abort the run with a conflict
//! 3. exactly one task is launched, tagged with a timestamped group
//! 4. the task is polled until RUNNING, then (independent budget) until STOPPED
//! 5. the first container's exit code decides success
//!
//! The conflict check and the launch are separate platform calls. Two
//! concurrent deployments can both pass the check; exclusion holds only while
//! deployments are serialised by the pipeline running them.

use super::error::{MigrationError, MigrationResult, PollPhase};
use super::events::MigrationEvent;
use super::platform::{
    task_family, task_id, PlacementConfig, PlatformError, RunTaskRequest, TaskDescription,
    TaskPlatform, TaskStatus,
};
use super::poll::{poll_until, Clock, PollOutcome, PollPolicy, TokioClock};
use super::state_machine::{MigrationStateMachine, StateTransition};
use crate::constants::migration;
use crate::logdriver::LogDriver;
use crate::logging::log_migration_phase;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Why a run did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DryRun,
    ExecutionDisabled,
}

/// Record of a migration task that ran to a zero exit code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub family: String,
    pub task_arn: String,
    pub group: String,
    pub exit_code: i32,
    pub history: Vec<StateTransition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum MigrationOutcome {
    /// Deliberate operator override; no platform call was made
    Skipped { reason: SkipReason },
    Completed(MigrationReport),
}

impl MigrationOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

pub struct MigrationTaskOrchestrator {
    platform: Arc<dyn TaskPlatform>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
    log_driver: Option<Arc<dyn LogDriver>>,
}

impl std::fmt::Debug for MigrationTaskOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationTaskOrchestrator")
            .field("policy", &self.policy)
            .field("log_driver", &self.log_driver)
            .finish()
    }
}

impl MigrationTaskOrchestrator {
    pub fn new(platform: Arc<dyn TaskPlatform>) -> Self {
        Self {
            platform,
            clock: Arc::new(TokioClock),
            policy: PollPolicy::default(),
            log_driver: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Driver used to point failed runs at their log stream
    pub fn with_log_driver(mut self, log_driver: Arc<dyn LogDriver>) -> Self {
        self.log_driver = Some(log_driver);
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Run the migration task defined by `task_definition` on `cluster`.
    ///
    /// Returns [`MigrationOutcome::Skipped`] without any platform call when
    /// `dry_run` is set or `execute` is not.
    pub async fn run_migration(
        &self,
        cluster: &str,
        task_definition: &str,
        placement: &PlacementConfig,
        execute: bool,
        dry_run: bool,
    ) -> MigrationResult<MigrationOutcome> {
        self.run(cluster, task_definition, placement, execute, dry_run, None)
            .await
    }

    /// [`Self::run_migration`] that stops polling once `cancel` turns true
    pub async fn run_migration_with_cancel(
        &self,
        cluster: &str,
        task_definition: &str,
        placement: &PlacementConfig,
        execute: bool,
        dry_run: bool,
        cancel: watch::Receiver<bool>,
    ) -> MigrationResult<MigrationOutcome> {
        self.run(
            cluster,
            task_definition,
            placement,
            execute,
            dry_run,
            Some(cancel),
        )
        .await
    }

    #[instrument(skip(self, placement, cancel), fields(family = task_family(task_definition)))]
    async fn run(
        &self,
        cluster: &str,
        task_definition: &str,
        placement: &PlacementConfig,
        execute: bool,
        dry_run: bool,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> MigrationResult<MigrationOutcome> {
        let family = task_family(task_definition).to_string();

        if dry_run || !execute {
            let reason = if dry_run {
                SkipReason::DryRun
            } else {
                SkipReason::ExecutionDisabled
            };
            info!(family = %family, outcome = "skipped", reason = ?reason, "⏭️ Migration skipped");
            return Ok(MigrationOutcome::Skipped { reason });
        }

        let mut machine = MigrationStateMachine::new(&family);

        // Best-effort exclusion; see module docs
        let running = self
            .platform
            .list_tasks(cluster, &family, TaskStatus::Running)
            .await
            .map_err(upstream)?;
        if !running.is_empty() {
            machine.transition(
                &MigrationEvent::ConflictFound(running.clone()),
                self.clock.now(),
            )?;
            warn!(family = %family, running = ?running, "🚫 Migration already running");
            return Err(MigrationError::ConflictDetected {
                family,
                task_arns: running,
            });
        }

        let group = format!(
            "{}:{}",
            migration::GROUP_PREFIX,
            self.clock.now().format("%Y%m%d%H%M%S")
        );
        let request = RunTaskRequest {
            cluster: cluster.to_string(),
            task_definition: task_definition.to_string(),
            count: 1,
            group: group.clone(),
            started_by: migration::STARTED_BY.to_string(),
            placement: placement.clone(),
        };
        let response = self.platform.run_task(&request).await.map_err(upstream)?;

        let Some(task_arn) = response
            .tasks
            .first()
            .and_then(|task| task.task_arn.clone())
        else {
            let reason = if response.failures.is_empty() {
                "platform returned no task".to_string()
            } else {
                response
                    .failures
                    .iter()
                    .map(|failure| failure.reason.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            machine.transition(
                &MigrationEvent::LaunchRejected(reason.clone()),
                self.clock.now(),
            )?;
            warn!(family = %family, reason = %reason, "❌ Migration launch failed");
            return Err(MigrationError::LaunchFailed { family, reason });
        };

        machine.transition(&MigrationEvent::Launched(task_arn.clone()), self.clock.now())?;
        log_migration_phase(&family, "submitted", Some(task_arn.as_str()));

        let mut task = self
            .await_status(
                &mut machine,
                cluster,
                &task_arn,
                PollPhase::AwaitingRunning,
                cancel.as_mut(),
            )
            .await?;

        if !task.last_status.is_stopped() {
            machine.transition(&MigrationEvent::ObservedRunning, self.clock.now())?;
            log_migration_phase(&family, "running", Some(task_arn.as_str()));

            task = self
                .await_status(
                    &mut machine,
                    cluster,
                    &task_arn,
                    PollPhase::AwaitingStopped,
                    cancel.as_mut(),
                )
                .await?;
        }

        let container = task.first_container();
        let exit_code = container.and_then(|container| container.exit_code);
        machine.transition(&MigrationEvent::ObservedStopped(exit_code), self.clock.now())?;
        log_migration_phase(&family, "stopped", Some(task_arn.as_str()));

        match exit_code {
            Some(0) => {
                info!(family = %family, task_arn = %task_arn, "✅ Migration completed");
                Ok(MigrationOutcome::Completed(MigrationReport {
                    family,
                    task_arn,
                    group,
                    exit_code: 0,
                    history: machine.into_history(),
                }))
            }
            _ => {
                let reason = container
                    .and_then(|container| container.reason.clone())
                    .or_else(|| task.stopped_reason.clone());
                let log_hint = self.log_driver.as_ref().and_then(|driver| {
                    let container_name = container
                        .map_or(migration::CONTAINER_NAME, |container| container.name.as_str());
                    driver.log_location(container_name, task_id(&task_arn))
                });
                warn!(
                    family = %family,
                    task_arn = %task_arn,
                    exit_code = ?exit_code,
                    "❌ Migration task failed"
                );
                Err(MigrationError::MigrationFailed {
                    task_arn,
                    exit_code,
                    reason,
                    log_hint,
                })
            }
        }
    }

    /// Poll `task_arn` until the phase's target status is seen
    async fn await_status(
        &self,
        machine: &mut MigrationStateMachine,
        cluster: &str,
        task_arn: &str,
        phase: PollPhase,
        cancel: Option<&mut watch::Receiver<bool>>,
    ) -> MigrationResult<TaskDescription> {
        let platform = &self.platform;

        let outcome = poll_until(&self.policy, self.clock.as_ref(), cancel, |attempt| async move {
            let task = platform
                .describe_task(cluster, task_arn)
                .await
                .map_err(upstream)?;
            debug!(
                task_arn,
                attempt,
                phase = %phase,
                status = ?task.as_ref().map(|task| task.last_status),
                "⏳ Polling migration task"
            );
            Ok::<_, MigrationError>(task.filter(|task| reached(phase, task.last_status)))
        })
        .await?;

        match outcome {
            PollOutcome::Ready { value, .. } => Ok(value),
            PollOutcome::Exhausted { attempts } => {
                machine.transition(&MigrationEvent::BudgetExhausted, self.clock.now())?;
                warn!(task_arn, phase = %phase, attempts, "⏰ Migration polling timed out");
                Err(MigrationError::TimedOut { phase, attempts })
            }
            PollOutcome::Cancelled { attempts } => {
                machine.transition(&MigrationEvent::Cancel, self.clock.now())?;
                info!(task_arn, phase = %phase, attempts, "🛑 Migration polling cancelled");
                Err(MigrationError::Cancelled { phase })
            }
        }
    }
}

fn reached(phase: PollPhase, status: TaskStatus) -> bool {
    match phase {
        PollPhase::AwaitingRunning => status.has_started(),
        PollPhase::AwaitingStopped => status.is_stopped(),
    }
}

fn upstream(error: PlatformError) -> MigrationError {
    MigrationError::UpstreamQueryError {
        operation: error.operation().to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_targets() {
        assert!(reached(PollPhase::AwaitingRunning, TaskStatus::Running));
        assert!(reached(PollPhase::AwaitingRunning, TaskStatus::Stopped));
        assert!(!reached(PollPhase::AwaitingRunning, TaskStatus::Provisioning));
        assert!(!reached(PollPhase::AwaitingStopped, TaskStatus::Running));
        assert!(reached(PollPhase::AwaitingStopped, TaskStatus::Stopped));
    }

    #[test]
    fn test_upstream_mapping() {
        let err = upstream(PlatformError::Throttled {
            operation: "describe_task".to_string(),
        });
        assert!(matches!(
            err,
            MigrationError::UpstreamQueryError { ref operation, .. } if operation == "describe_task"
        ));
    }
}
