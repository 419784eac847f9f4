mod common;

use common::*;
use deploy_core::logdriver::{LogDriverConfig, LogDriverKind};
use deploy_core::migration::{
    MigrationError, MigrationOutcome, MigrationState, MigrationTaskOrchestrator, PlatformError,
    PollPhase, PollPolicy, SkipReason, TaskStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn orchestrator(
    platform: &Arc<MockTaskPlatform>,
    clock: &Arc<RecordingClock>,
) -> MigrationTaskOrchestrator {
    MigrationTaskOrchestrator::new(platform.clone()).with_clock(clock.clone())
}

async fn run(orchestrator: &MigrationTaskOrchestrator) -> Result<MigrationOutcome, MigrationError> {
    orchestrator
        .run_migration(
            "acme-cluster",
            MIGRATION_TASK_DEFINITION,
            &sample_placement(),
            true,
            false,
        )
        .await
}

#[tokio::test]
async fn test_successful_migration_reports_history() {
    let platform = Arc::new(
        MockTaskPlatform::launching()
            .then_status(TaskStatus::Provisioning)
            .then_status(TaskStatus::Running)
            .then_stopped(Some(0), None),
    );
    let clock = Arc::new(RecordingClock::new());

    let outcome = run(&orchestrator(&platform, &clock)).await.unwrap();

    let MigrationOutcome::Completed(report) = outcome else {
        panic!("expected a completed migration, got {outcome:?}");
    };
    assert_eq!(report.family, "acme-migrate");
    assert_eq!(report.task_arn, TASK_ARN);
    assert_eq!(report.exit_code, 0);

    let states: Vec<MigrationState> = report.history.iter().map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            MigrationState::Submitted,
            MigrationState::Running,
            MigrationState::Stopped { exit_code: Some(0) },
        ]
    );

    let calls = platform.calls();
    assert_eq!(calls.list_tasks.len(), 1);
    assert_eq!(calls.run_task.len(), 1);
    assert_eq!(calls.describe_task, 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(6)]);
}

#[tokio::test]
async fn test_conflict_never_launches() {
    let platform = Arc::new(
        MockTaskPlatform::launching().with_running(&["arn:aws:ecs:us-east-1:123456789012:task/old"]),
    );
    let clock = Arc::new(RecordingClock::new());

    let err = run(&orchestrator(&platform, &clock)).await.unwrap_err();

    match err {
        MigrationError::ConflictDetected { family, task_arns } => {
            assert_eq!(family, "acme-migrate");
            assert_eq!(task_arns.len(), 1);
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    let calls = platform.calls();
    assert_eq!(calls.list_tasks[0].1, "acme-migrate");
    assert_eq!(calls.list_tasks[0].2, TaskStatus::Running);
    assert!(calls.run_task.is_empty());
    assert_eq!(calls.describe_task, 0);
}

#[tokio::test]
async fn test_launch_request_is_tagged_for_traceability() {
    let platform = Arc::new(MockTaskPlatform::launching().then_stopped(Some(0), None));
    let clock = Arc::new(RecordingClock::new());

    run(&orchestrator(&platform, &clock)).await.unwrap();

    let request = &platform.calls().run_task[0];
    assert_eq!(request.cluster, "acme-cluster");
    assert_eq!(request.task_definition, MIGRATION_TASK_DEFINITION);
    assert_eq!(request.count, 1);
    assert_eq!(request.group, "migration:20260314150926");
    assert_eq!(request.started_by, "deploy-core");
    assert_eq!(request.placement, sample_placement());
}

#[tokio::test]
async fn test_task_that_exits_before_running_is_observed() {
    let platform = Arc::new(MockTaskPlatform::launching().then_stopped(Some(0), None));
    let clock = Arc::new(RecordingClock::new());

    let outcome = run(&orchestrator(&platform, &clock)).await.unwrap();

    let MigrationOutcome::Completed(report) = outcome else {
        panic!("expected a completed migration");
    };
    assert_eq!(report.history.len(), 2);
    assert_eq!(report.history[1].from, MigrationState::Submitted);
    assert_eq!(platform.calls().describe_task, 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_unknown_task_is_polled_until_visible() {
    let platform = Arc::new(
        MockTaskPlatform::launching()
            .then_missing()
            .then_missing()
            .then_status(TaskStatus::Running)
            .then_stopped(Some(0), None),
    );
    let clock = Arc::new(RecordingClock::new());

    let outcome = run(&orchestrator(&platform, &clock)).await.unwrap();

    assert!(matches!(outcome, MigrationOutcome::Completed(_)));
    assert_eq!(platform.calls().describe_task, 4);
    assert_eq!(clock.sleeps().len(), 2);
}

#[tokio::test]
async fn test_non_zero_exit_fails_with_log_hint() {
    let platform = Arc::new(
        MockTaskPlatform::launching()
            .then_status(TaskStatus::Running)
            .then_stopped(Some(1), Some("relation already exists")),
    );
    let clock = Arc::new(RecordingClock::new());
    let driver = LogDriverConfig::default()
        .driver_for("us-east-1", "/acme/migrate", "migrate")
        .unwrap();

    let err = run(&orchestrator(&platform, &clock).with_log_driver(Arc::from(driver)))
        .await
        .unwrap_err();

    match &err {
        MigrationError::MigrationFailed {
            task_arn,
            exit_code,
            reason,
            log_hint,
        } => {
            assert_eq!(task_arn, TASK_ARN);
            assert_eq!(*exit_code, Some(1));
            assert_eq!(reason.as_deref(), Some("relation already exists"));
            assert_eq!(
                log_hint.as_deref(),
                Some("/acme/migrate:migrate/migrate/0f1e2d3c4b5a69788796a5b4c3d2e1f0")
            );
        }
        other => panic!("expected a failed migration, got {other:?}"),
    }
    assert_eq!(err.exit_code(), Some(1));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_missing_exit_code_is_a_failure() {
    let platform = Arc::new(
        MockTaskPlatform::launching()
            .then_status(TaskStatus::Running)
            .then_stopped(None, None),
    );
    let clock = Arc::new(RecordingClock::new());

    let err = run(&orchestrator(&platform, &clock)).await.unwrap_err();

    match err {
        MigrationError::MigrationFailed {
            exit_code, reason, ..
        } => {
            assert_eq!(exit_code, None);
            assert_eq!(reason.as_deref(), Some("Essential container in task exited"));
        }
        other => panic!("expected a failed migration, got {other:?}"),
    }
}

#[tokio::test]
async fn test_task_that_never_runs_times_out_after_full_budget() {
    let platform = Arc::new(MockTaskPlatform::launching().then_status(TaskStatus::Pending));
    let clock = Arc::new(RecordingClock::new());

    let err = run(&orchestrator(&platform, &clock)).await.unwrap_err();

    assert!(matches!(
        err,
        MigrationError::TimedOut {
            phase: PollPhase::AwaitingRunning,
            attempts: 50
        }
    ));
    assert_eq!(platform.calls().describe_task, 50);
    let sleeps = clock.sleeps();
    assert_eq!(sleeps.len() as u32, PollPolicy::default().sleeps());
    assert!(sleeps.iter().all(|sleep| *sleep == Duration::from_secs(6)));
    assert!(sleeps.iter().sum::<Duration>() < PollPolicy::default().budget());
}

#[tokio::test]
async fn test_task_that_never_stops_times_out_awaiting_stop() {
    let platform = Arc::new(MockTaskPlatform::launching().then_status(TaskStatus::Running));
    let clock = Arc::new(RecordingClock::new());
    let orchestrator =
        orchestrator(&platform, &clock).with_policy(PollPolicy::new(Duration::from_secs(1), 4));

    let err = run(&orchestrator).await.unwrap_err();

    assert!(matches!(
        err,
        MigrationError::TimedOut {
            phase: PollPhase::AwaitingStopped,
            attempts: 4
        }
    ));
    assert_eq!(platform.calls().describe_task, 5);
}

#[tokio::test]
async fn test_dry_run_and_disabled_execution_make_no_calls() {
    let platform = Arc::new(MockTaskPlatform::launching());
    let clock = Arc::new(RecordingClock::new());
    let orchestrator = orchestrator(&platform, &clock);

    let dry_run = orchestrator
        .run_migration(
            "acme-cluster",
            MIGRATION_TASK_DEFINITION,
            &sample_placement(),
            true,
            true,
        )
        .await
        .unwrap();
    let disabled = orchestrator
        .run_migration(
            "acme-cluster",
            MIGRATION_TASK_DEFINITION,
            &sample_placement(),
            false,
            false,
        )
        .await
        .unwrap();

    assert_eq!(
        dry_run,
        MigrationOutcome::Skipped {
            reason: SkipReason::DryRun
        }
    );
    assert_eq!(
        disabled,
        MigrationOutcome::Skipped {
            reason: SkipReason::ExecutionDisabled
        }
    );
    assert_eq!(platform.calls().total(), 0);
}

#[tokio::test]
async fn test_rejected_launch_reports_every_reason() {
    let platform = Arc::new(MockTaskPlatform::rejecting(&[
        "RESOURCE:MEMORY",
        "AGENT disconnected",
    ]));
    let clock = Arc::new(RecordingClock::new());

    let err = run(&orchestrator(&platform, &clock)).await.unwrap_err();

    match err {
        MigrationError::LaunchFailed { family, reason } => {
            assert_eq!(family, "acme-migrate");
            assert_eq!(reason, "RESOURCE:MEMORY; AGENT disconnected");
        }
        other => panic!("expected a launch failure, got {other:?}"),
    }
    assert_eq!(platform.calls().describe_task, 0);
}

#[tokio::test]
async fn test_empty_launch_response_is_a_launch_failure() {
    let platform = Arc::new(MockTaskPlatform::rejecting(&[]));
    let clock = Arc::new(RecordingClock::new());

    let err = run(&orchestrator(&platform, &clock)).await.unwrap_err();

    assert!(matches!(
        err,
        MigrationError::LaunchFailed { ref reason, .. } if reason == "platform returned no task"
    ));
}

#[tokio::test]
async fn test_platform_errors_are_not_retried() {
    let platform = Arc::new(MockTaskPlatform::launching().then_error(PlatformError::Throttled {
        operation: "describe_task".to_string(),
    }));
    let clock = Arc::new(RecordingClock::new());

    let err = run(&orchestrator(&platform, &clock)).await.unwrap_err();

    assert!(matches!(
        err,
        MigrationError::UpstreamQueryError { ref operation, .. } if operation == "describe_task"
    ));
    assert_eq!(platform.calls().describe_task, 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_polling() {
    let platform = Arc::new(MockTaskPlatform::launching().then_status(TaskStatus::Pending));
    let clock = Arc::new(RecordingClock::new());
    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();

    let err = orchestrator(&platform, &clock)
        .run_migration_with_cancel(
            "acme-cluster",
            MIGRATION_TASK_DEFINITION,
            &sample_placement(),
            true,
            false,
            cancel_rx,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MigrationError::Cancelled {
            phase: PollPhase::AwaitingRunning
        }
    ));
    assert_eq!(platform.calls().run_task.len(), 1);
    assert_eq!(platform.calls().describe_task, 0);
}

#[test]
fn test_default_policy_budget() {
    let policy = PollPolicy::default();
    assert_eq!(policy.interval, Duration::from_secs(6));
    assert_eq!(policy.max_attempts, 50);
    assert_eq!(policy.budget(), Duration::from_secs(300));
    assert_eq!(policy.sleeps(), 49);
    assert_eq!(LogDriverConfig::default().kind, LogDriverKind::AwsLogs);
}
