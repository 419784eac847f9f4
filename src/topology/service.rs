//! Long-running service descriptions consumed by the composer.

use super::container::{EnvironmentVariable, SecretReference, TaskSizing};
use super::types::HealthCheckSpec;
use crate::config::ServiceOverrides;
use crate::constants::{service, task_sizing};
use crate::context::DeploymentContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a long-running service plays in the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    Api,
    Console,
}

impl ServiceRole {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Console => "console",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Api => service::API_PORT,
            Self::Console => service::CONSOLE_PORT,
        }
    }

    pub fn default_desired_count(&self) -> u32 {
        match self {
            Self::Api => service::API_DESIRED_COUNT,
            Self::Console => service::CONSOLE_DESIRED_COUNT,
        }
    }

    pub fn health_check_path(&self) -> &'static str {
        match self {
            Self::Api => "/health",
            Self::Console => "/",
        }
    }

    /// Browser-facing services also match on a wildcard path
    pub fn is_browser_facing(&self) -> bool {
        matches!(self, Self::Console)
    }

    /// Whether the service calls storage and secret endpoints directly
    pub fn needs_private_endpoints(&self) -> bool {
        matches!(self, Self::Api)
    }

    /// Listener rule priority; lower wins
    pub fn rule_priority(&self) -> u32 {
        match self {
            Self::Api => 10,
            Self::Console => 20,
        }
    }

    pub fn host_header(&self, domain: &str) -> String {
        match self {
            Self::Api => format!("api.{domain}"),
            Self::Console => domain.to_string(),
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the composer needs to know about one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    pub name: String,
    pub role: ServiceRole,
    pub image: String,
    pub listen_port: u16,
    /// Container port behind the private TLS pool
    pub tls_port: u16,
    pub health_check: HealthCheckSpec,
    pub host_headers: Vec<String>,
    pub path_patterns: Vec<String>,
    pub rule_priority: u32,
    pub sizing: TaskSizing,
    pub desired_count: u32,
    pub environment: Vec<EnvironmentVariable>,
    pub secrets: Vec<SecretReference>,
    pub needs_private_endpoints: bool,
    pub command: Option<Vec<String>>,
}

impl ServiceSpec {
    /// Spec for a role with documented defaults and configured overrides applied
    pub fn for_role(
        context: &DeploymentContext,
        role: ServiceRole,
        overrides: &ServiceOverrides,
    ) -> Self {
        let sizing = TaskSizing::resolve(
            overrides.cpu,
            overrides.memory,
            TaskSizing {
                cpu: task_sizing::SERVICE_CPU_UNITS,
                memory: task_sizing::SERVICE_MEMORY_MIB,
            },
        );
        let desired_count = if overrides.desired_count > 0 {
            overrides.desired_count
        } else {
            role.default_desired_count()
        };
        let path_patterns = if role.is_browser_facing() {
            vec!["/*".to_string()]
        } else {
            Vec::new()
        };

        Self {
            name: role.name().to_string(),
            role,
            image: context.image.image_for(role.name()),
            listen_port: role.default_port(),
            tls_port: service::PRIVATE_TLS_PORT,
            health_check: HealthCheckSpec::on_path(role.health_check_path()),
            host_headers: vec![role.host_header(&context.domain)],
            path_patterns,
            rule_priority: role.rule_priority(),
            sizing,
            desired_count,
            environment: Vec::new(),
            secrets: Vec::new(),
            needs_private_endpoints: role.needs_private_endpoints(),
            command: None,
        }
    }

    pub fn with_environment(mut self, environment: Vec<EnvironmentVariable>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_secrets(mut self, secrets: Vec<SecretReference>) -> Self {
        self.secrets = secrets;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::sample_context;

    #[test]
    fn test_role_defaults() {
        let context = sample_context("us-east-1");

        let api = ServiceSpec::for_role(&context, ServiceRole::Api, &ServiceOverrides::default());
        assert_eq!(api.listen_port, 8000);
        assert_eq!(api.desired_count, 3);
        assert_eq!(api.host_headers, vec!["api.acme.example.com"]);
        assert!(api.path_patterns.is_empty());
        assert_eq!(api.sizing.cpu, 1024);

        let console =
            ServiceSpec::for_role(&context, ServiceRole::Console, &ServiceOverrides::default());
        assert_eq!(console.listen_port, 3000);
        assert_eq!(console.desired_count, 3);
        assert_eq!(console.path_patterns, vec!["/*"]);
        assert_eq!(console.image, "registry.example.com/acme/console:1.2.3");
    }

    #[test]
    fn test_overrides_win_when_positive() {
        let context = sample_context("us-east-1");
        let overrides = ServiceOverrides {
            cpu: 2048,
            memory: 0,
            desired_count: 1,
        };

        let spec = ServiceSpec::for_role(&context, ServiceRole::Api, &overrides);
        assert_eq!(spec.sizing.cpu, 2048);
        assert_eq!(spec.sizing.memory, 2048);
        assert_eq!(spec.desired_count, 1);
    }
}
