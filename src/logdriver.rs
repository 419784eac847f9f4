//! # Log Drivers
//!
//! Container log shipping is a capability: the container definition only needs
//! the structured configuration a driver produces, so the composer depends on
//! the [`LogDriver`] trait and never on a concrete backend.
//!
//! Drivers are created by [`create_log_driver`] from a [`LogDriverKind`] and
//! JSON-encoded arguments, the same shape the configuration file carries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogDriverError {
    #[error("Invalid arguments for {kind} log driver: {reason}")]
    InvalidArguments { kind: LogDriverKind, reason: String },
}

/// Supported log backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogDriverKind {
    /// Platform-native log groups
    #[default]
    AwsLogs,
    /// Sidecar router (fluent-bit) forwarding to an arbitrary output plugin
    FireLens,
    /// HTTP event collector
    Splunk,
}

impl fmt::Display for LogDriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwsLogs => write!(f, "awslogs"),
            Self::FireLens => write!(f, "awsfirelens"),
            Self::Splunk => write!(f, "splunk"),
        }
    }
}

/// Log-driver block embedded verbatim in a container definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfiguration {
    pub log_driver: String,
    pub options: BTreeMap<String, String>,
}

/// Capability every log backend provides
pub trait LogDriver: Send + Sync + fmt::Debug {
    fn kind(&self) -> LogDriverKind;

    /// Structured configuration for the container definition
    fn configuration(&self) -> LogConfiguration;

    /// Where the logs of one task's container end up, when the backend can tell
    fn log_location(&self, _container_name: &str, _task_id: &str) -> Option<String> {
        None
    }
}

/// Log driver section of the deployment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDriverConfig {
    #[serde(default)]
    pub kind: LogDriverKind,
    /// JSON object with backend-specific arguments
    #[serde(default = "default_options")]
    pub options: String,
}

fn default_options() -> String {
    "{}".to_string()
}

impl Default for LogDriverConfig {
    fn default() -> Self {
        Self {
            kind: LogDriverKind::default(),
            options: default_options(),
        }
    }
}

impl LogDriverConfig {
    /// Create the driver for one component, filling in `region`, `stream_prefix`
    /// and a default `log_group` when the configured arguments leave them out
    pub fn driver_for(
        &self,
        region: &str,
        log_group: &str,
        stream_prefix: &str,
    ) -> Result<Box<dyn LogDriver>, LogDriverError> {
        let mut args: serde_json::Value =
            serde_json::from_str(&self.options).map_err(|e| invalid(self.kind, e))?;
        let object = args.as_object_mut().ok_or_else(|| LogDriverError::InvalidArguments {
            kind: self.kind,
            reason: "arguments must be a JSON object".to_string(),
        })?;

        if self.kind == LogDriverKind::AwsLogs {
            object
                .entry("region")
                .or_insert_with(|| serde_json::Value::String(region.to_string()));
            object
                .entry("log_group")
                .or_insert_with(|| serde_json::Value::String(log_group.to_string()));
            object.insert(
                "stream_prefix".to_string(),
                serde_json::Value::String(stream_prefix.to_string()),
            );
        }

        create_log_driver(self.kind, &args.to_string())
    }
}

/// Create a driver from its kind and JSON-encoded arguments
pub fn create_log_driver(
    kind: LogDriverKind,
    json_args: &str,
) -> Result<Box<dyn LogDriver>, LogDriverError> {
    match kind {
        LogDriverKind::AwsLogs => {
            let driver: AwsLogsDriver =
                serde_json::from_str(json_args).map_err(|e| invalid(kind, e))?;
            Ok(Box::new(driver))
        }
        LogDriverKind::FireLens => {
            let driver: FireLensDriver =
                serde_json::from_str(json_args).map_err(|e| invalid(kind, e))?;
            Ok(Box::new(driver))
        }
        LogDriverKind::Splunk => {
            let driver: SplunkDriver =
                serde_json::from_str(json_args).map_err(|e| invalid(kind, e))?;
            Ok(Box::new(driver))
        }
    }
}

fn invalid(kind: LogDriverKind, error: serde_json::Error) -> LogDriverError {
    LogDriverError::InvalidArguments {
        kind,
        reason: error.to_string(),
    }
}

/// Platform-native log groups
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AwsLogsDriver {
    pub log_group: String,
    pub region: String,
    pub stream_prefix: String,
    #[serde(default)]
    pub create_group: bool,
}

impl LogDriver for AwsLogsDriver {
    fn kind(&self) -> LogDriverKind {
        LogDriverKind::AwsLogs
    }

    fn configuration(&self) -> LogConfiguration {
        let mut options = BTreeMap::from([
            ("awslogs-group".to_string(), self.log_group.clone()),
            ("awslogs-region".to_string(), self.region.clone()),
            ("awslogs-stream-prefix".to_string(), self.stream_prefix.clone()),
        ]);
        if self.create_group {
            options.insert("awslogs-create-group".to_string(), "true".to_string());
        }

        LogConfiguration {
            log_driver: self.kind().to_string(),
            options,
        }
    }

    fn log_location(&self, container_name: &str, task_id: &str) -> Option<String> {
        Some(format!(
            "{}:{}/{container_name}/{task_id}",
            self.log_group, self.stream_prefix
        ))
    }
}

/// Fluent-bit sidecar routing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FireLensDriver {
    /// Output plugin name
    pub name: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl LogDriver for FireLensDriver {
    fn kind(&self) -> LogDriverKind {
        LogDriverKind::FireLens
    }

    fn configuration(&self) -> LogConfiguration {
        let mut options = self.options.clone();
        options.insert("Name".to_string(), self.name.clone());
        LogConfiguration {
            log_driver: self.kind().to_string(),
            options,
        }
    }
}

/// HTTP event collector
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SplunkDriver {
    pub url: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
}

impl LogDriver for SplunkDriver {
    fn kind(&self) -> LogDriverKind {
        LogDriverKind::Splunk
    }

    fn configuration(&self) -> LogConfiguration {
        let mut options = BTreeMap::from([("splunk-url".to_string(), self.url.clone())]);
        if let Some(source_type) = &self.source_type {
            options.insert("splunk-sourcetype".to_string(), source_type.clone());
        }
        if let Some(index) = &self.index {
            options.insert("splunk-index".to_string(), index.clone());
        }
        LogConfiguration {
            log_driver: self.kind().to_string(),
            options,
        }
    }
}
