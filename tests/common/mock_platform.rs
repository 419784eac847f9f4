//! Scripted container platform and clock for orchestrator tests.
//!
//! `describe_task` answers are consumed in order; once the script runs out the
//! last answer repeats, which models a task that stays in one state.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use deploy_core::migration::{
    Clock, ContainerStatus, LaunchFailure, LaunchedTask, PlatformError, RunTaskRequest,
    RunTaskResponse, TaskDescription, TaskPlatform, TaskStatus,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

pub const TASK_ARN: &str =
    "arn:aws:ecs:us-east-1:123456789012:task/acme-cluster/0f1e2d3c4b5a69788796a5b4c3d2e1f0";

/// Calls observed by the mock
#[derive(Debug, Default, Clone)]
pub struct PlatformCalls {
    pub list_tasks: Vec<(String, String, TaskStatus)>,
    pub run_task: Vec<RunTaskRequest>,
    pub describe_task: u32,
}

impl PlatformCalls {
    pub fn total(&self) -> usize {
        self.list_tasks.len() + self.run_task.len() + self.describe_task as usize
    }
}

#[derive(Debug, Default)]
struct MockPlatformState {
    running: Vec<String>,
    launch: RunTaskResponse,
    script: VecDeque<Result<Option<TaskDescription>, PlatformError>>,
    last_answer: Option<Result<Option<TaskDescription>, PlatformError>>,
    calls: PlatformCalls,
}

/// Task platform whose answers are scripted up front
#[derive(Debug, Default)]
pub struct MockTaskPlatform {
    state: Mutex<MockPlatformState>,
}

impl MockTaskPlatform {
    /// Platform that accepts the launch and returns [`TASK_ARN`]
    pub fn launching() -> Self {
        let platform = Self::default();
        platform.state.lock().launch = RunTaskResponse {
            tasks: vec![LaunchedTask {
                task_arn: Some(TASK_ARN.to_string()),
                last_status: Some(TaskStatus::Provisioning),
            }],
            failures: Vec::new(),
        };
        platform
    }

    /// Platform that rejects the launch with `reasons`
    pub fn rejecting(reasons: &[&str]) -> Self {
        let platform = Self::default();
        platform.state.lock().launch = RunTaskResponse {
            tasks: Vec::new(),
            failures: reasons
                .iter()
                .map(|reason| LaunchFailure {
                    arn: None,
                    reason: reason.to_string(),
                })
                .collect(),
        };
        platform
    }

    pub fn with_running(self, task_arns: &[&str]) -> Self {
        self.state.lock().running = task_arns.iter().map(|arn| arn.to_string()).collect();
        self
    }

    /// Next describe answer reports `status`
    pub fn then_status(self, status: TaskStatus) -> Self {
        self.push(Ok(Some(description(status, None, None))))
    }

    /// Next describe answer reports a stopped task
    pub fn then_stopped(self, exit_code: Option<i32>, reason: Option<&str>) -> Self {
        self.push(Ok(Some(description(
            TaskStatus::Stopped,
            exit_code,
            reason.map(str::to_string),
        ))))
    }

    /// Next describe answer does not know the task yet
    pub fn then_missing(self) -> Self {
        self.push(Ok(None))
    }

    pub fn then_error(self, error: PlatformError) -> Self {
        self.push(Err(error))
    }

    pub fn calls(&self) -> PlatformCalls {
        self.state.lock().calls.clone()
    }

    fn push(self, answer: Result<Option<TaskDescription>, PlatformError>) -> Self {
        self.state.lock().script.push_back(answer);
        self
    }
}

fn description(
    status: TaskStatus,
    exit_code: Option<i32>,
    reason: Option<String>,
) -> TaskDescription {
    TaskDescription {
        task_arn: TASK_ARN.to_string(),
        last_status: status,
        containers: vec![ContainerStatus {
            name: "migrate".to_string(),
            exit_code,
            reason,
        }],
        stopped_reason: status
            .is_stopped()
            .then(|| "Essential container in task exited".to_string()),
    }
}

#[async_trait]
impl TaskPlatform for MockTaskPlatform {
    async fn list_tasks(
        &self,
        cluster: &str,
        family: &str,
        status: TaskStatus,
    ) -> Result<Vec<String>, PlatformError> {
        let mut state = self.state.lock();
        state
            .calls
            .list_tasks
            .push((cluster.to_string(), family.to_string(), status));
        Ok(state.running.clone())
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<RunTaskResponse, PlatformError> {
        let mut state = self.state.lock();
        state.calls.run_task.push(request.clone());
        Ok(state.launch.clone())
    }

    async fn describe_task(
        &self,
        _cluster: &str,
        _task_arn: &str,
    ) -> Result<Option<TaskDescription>, PlatformError> {
        let mut state = self.state.lock();
        state.calls.describe_task += 1;

        let answer = match state.script.pop_front() {
            Some(answer) => answer,
            None => state.last_answer.clone().unwrap_or(Ok(None)),
        };
        state.last_answer = Some(answer.clone());
        answer
    }
}

/// Clock that never waits; sleeps advance a virtual now and are recorded
#[derive(Debug)]
pub struct RecordingClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap())
    }

    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

impl Default for RecordingClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        {
            let mut now = self.now.lock();
            *now += ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::zero());
        }
        tokio::task::yield_now().await;
    }
}
