//! # Deployment Constants
//!
//! Documented defaults that define the operational boundaries of a deployment.
//! Any configured value that is absent or not greater than zero falls back to
//! the constant here.

use std::time::Duration;

/// Service principal allowed to assume container identities
pub const TASK_SERVICE_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Managed baseline policies, in canonical (standard partition) form
pub mod managed_policies {
    /// Image pull, log shipping and secret retrieval for the execution identity
    pub const TASK_EXECUTION_BASELINE: &str =
        "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";
}

/// Target pool health check defaults
pub mod health_check {
    pub const INTERVAL_SECONDS: u32 = 10;
    pub const TIMEOUT_SECONDS: u32 = 5;
    pub const HEALTHY_THRESHOLD: u32 = 5;
    pub const UNHEALTHY_THRESHOLD: u32 = 2;
    pub const SUCCESS_CODES: &str = "200-399";
}

/// Task sizing defaults applied when configuration leaves a value at zero
pub mod task_sizing {
    pub const SERVICE_CPU_UNITS: u32 = 1024;
    pub const SERVICE_MEMORY_MIB: u32 = 2048;
    pub const MIGRATION_CPU_UNITS: u32 = 512;
    pub const MIGRATION_MEMORY_MIB: u32 = 1024;
}

/// Long-running service defaults
pub mod service {
    /// Both the API and the console run three replicas unless configured otherwise
    pub const API_DESIRED_COUNT: u32 = 3;
    pub const CONSOLE_DESIRED_COUNT: u32 = 3;
    pub const API_PORT: u16 = 8000;
    pub const CONSOLE_PORT: u16 = 3000;
    pub const PRIVATE_TLS_PORT: u16 = 8443;
    pub const HEALTH_CHECK_GRACE_PERIOD_SECONDS: u32 = 60;
}

/// Elastic capacity defaults
pub mod scaling {
    pub const MIN_CAPACITY: u32 = 1;
    pub const MAX_CAPACITY: u32 = 6;
    pub const TARGET_UTILIZATION_PERCENT: f64 = 65.0;
    pub const SCALE_IN_COOLDOWN_SECONDS: u32 = 60;
    pub const SCALE_OUT_COOLDOWN_SECONDS: u32 = 60;
}

/// Load balancer listener ports
pub mod listeners {
    pub const HTTP_PORT: u16 = 80;
    pub const HTTPS_PORT: u16 = 443;
    pub const TLS_POLICY: &str = "ELBSecurityPolicy-TLS13-1-2-2021-06";
}

/// Migration task polling
pub mod migration {
    use super::Duration;

    pub const POLL_INTERVAL: Duration = Duration::from_secs(6);
    pub const POLL_MAX_ATTEMPTS: u32 = 50;
    pub const STARTED_BY: &str = "deploy-core";
    pub const GROUP_PREFIX: &str = "migration";
    pub const CONTAINER_NAME: &str = "migrate";
}

/// Ports used by restricted-egress rules
pub mod egress {
    pub const HTTPS_PORT: u16 = 443;
    pub const ANY_IPV4: &str = "0.0.0.0/0";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_budget_is_five_minutes() {
        let budget = migration::POLL_INTERVAL * migration::POLL_MAX_ATTEMPTS;
        assert_eq!(budget, Duration::from_secs(300));
    }

    #[test]
    fn test_scaling_bounds_are_ordered() {
        assert!(scaling::MIN_CAPACITY <= scaling::MAX_CAPACITY);
        assert!(scaling::MIN_CAPACITY <= service::API_DESIRED_COUNT);
        assert!(service::CONSOLE_DESIRED_COUNT <= scaling::MAX_CAPACITY);
    }
}
