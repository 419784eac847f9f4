//! Container platform contract used by the migration orchestrator.
//!
//! Only the three task operations the orchestrator needs are modelled. The
//! platform's task registry is eventually consistent, so a freshly launched
//! task may be missing from the first few `describe_task` answers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("{operation} request failed: {message}")]
    Request { operation: String, message: String },

    #[error("{operation} request throttled")]
    Throttled { operation: String },
}

impl PlatformError {
    pub fn operation(&self) -> &str {
        match self {
            Self::Request { operation, .. } | Self::Throttled { operation } => operation,
        }
    }
}

/// Platform-reported task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Provisioning,
    Pending,
    Activating,
    Running,
    Deactivating,
    Stopping,
    Deprovisioning,
    Stopped,
}

impl TaskStatus {
    /// The task has reached RUNNING at some point
    pub fn has_started(&self) -> bool {
        matches!(
            self,
            Self::Running | Self::Deactivating | Self::Stopping | Self::Deprovisioning | Self::Stopped
        )
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Provisioning => "PROVISIONING",
            Self::Pending => "PENDING",
            Self::Activating => "ACTIVATING",
            Self::Running => "RUNNING",
            Self::Deactivating => "DEACTIVATING",
            Self::Stopping => "STOPPING",
            Self::Deprovisioning => "DEPROVISIONING",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Network placement of a one-shot task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlacementConfig {
    pub subnet_ids: Vec<String>,
    pub security_boundary_ids: Vec<String>,
    #[serde(default)]
    pub assign_public_ip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTaskRequest {
    pub cluster: String,
    pub task_definition: String,
    pub count: u32,
    /// Traceability tag, `migration:<UTC timestamp>`
    pub group: String,
    pub started_by: String,
    pub placement: PlacementConfig,
}

/// Task as returned by a launch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LaunchedTask {
    pub task_arn: Option<String>,
    pub last_status: Option<TaskStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchFailure {
    pub arn: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunTaskResponse {
    pub tasks: Vec<LaunchedTask>,
    pub failures: Vec<LaunchFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescription {
    pub task_arn: String,
    pub last_status: TaskStatus,
    pub containers: Vec<ContainerStatus>,
    pub stopped_reason: Option<String>,
}

impl TaskDescription {
    pub fn first_container(&self) -> Option<&ContainerStatus> {
        self.containers.first()
    }
}

/// Task operations of the container platform
#[async_trait]
pub trait TaskPlatform: Send + Sync {
    /// Identifiers of the family's tasks currently in `status`
    async fn list_tasks(
        &self,
        cluster: &str,
        family: &str,
        status: TaskStatus,
    ) -> Result<Vec<String>, PlatformError>;

    async fn run_task(&self, request: &RunTaskRequest) -> Result<RunTaskResponse, PlatformError>;

    /// `None` while the task is not yet visible
    async fn describe_task(
        &self,
        cluster: &str,
        task_arn: &str,
    ) -> Result<Option<TaskDescription>, PlatformError>;
}

/// Family name of a task definition reference (`family`, `family:rev` or a full ARN)
pub fn task_family(task_definition: &str) -> &str {
    let name = task_definition
        .rsplit_once('/')
        .map_or(task_definition, |(_, name)| name);
    name.split_once(':').map_or(name, |(family, _)| family)
}

/// Short task id, the last path segment of the task ARN
pub fn task_id(task_arn: &str) -> &str {
    task_arn.rsplit('/').next().unwrap_or(task_arn)
}
