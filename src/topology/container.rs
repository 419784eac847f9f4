//! Container and task definitions.
//!
//! Environment variables and secrets are explicit typed records; they are only
//! turned into JSON when the task definition is declared to the registry.

use crate::logdriver::LogConfiguration;
use serde::{Deserialize, Serialize};

/// Plain environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// Secret exposed to a container by reference, never by value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    /// Opaque reference (parameter or secret ARN) resolved by the platform at launch
    pub value_from: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: TransportProtocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    Tcp,
}

impl PortMapping {
    pub fn tcp(container_port: u16) -> Self {
        Self {
            container_port,
            protocol: TransportProtocol::Tcp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub essential: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    pub port_mappings: Vec<PortMapping>,
    pub environment: Vec<EnvironmentVariable>,
    pub secrets: Vec<SecretReference>,
    pub log_configuration: LogConfiguration,
}

/// CPU and memory reservations of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSizing {
    /// CPU units (1024 = one vCPU)
    pub cpu: u32,
    /// Memory in MiB
    pub memory: u32,
}

impl TaskSizing {
    /// Explicit value if greater than zero, the documented default otherwise
    pub fn resolve(explicit_cpu: u32, explicit_memory: u32, defaults: TaskSizing) -> Self {
        Self {
            cpu: if explicit_cpu > 0 { explicit_cpu } else { defaults.cpu },
            memory: if explicit_memory > 0 {
                explicit_memory
            } else {
                defaults.memory
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub family: String,
    pub cpu: u32,
    pub memory: u32,
    pub network_mode: String,
    pub requires_compatibilities: Vec<String>,
    pub execution_role_arn: String,
    pub task_role_arn: String,
    pub container_definitions: Vec<ContainerDefinition>,
    #[serde(skip_deserializing)]
    pub arn: String,
}

impl TaskDefinition {
    pub fn new(
        family: impl Into<String>,
        sizing: TaskSizing,
        execution_role_arn: impl Into<String>,
        task_role_arn: impl Into<String>,
        container: ContainerDefinition,
    ) -> Self {
        Self {
            family: family.into(),
            cpu: sizing.cpu,
            memory: sizing.memory,
            network_mode: "awsvpc".to_string(),
            requires_compatibilities: vec!["FARGATE".to_string()],
            execution_role_arn: execution_role_arn.into(),
            task_role_arn: task_role_arn.into(),
            container_definitions: vec![container],
            arn: String::new(),
        }
    }

    /// The essential container, which is the one whose exit code matters
    pub fn primary_container(&self) -> Option<&ContainerDefinition> {
        self.container_definitions
            .iter()
            .find(|container| container.essential)
            .or_else(|| self.container_definitions.first())
    }
}
