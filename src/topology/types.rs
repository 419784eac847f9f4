//! Typed records making up a service topology.

use super::container::TaskDefinition;
use crate::constants::{health_check, scaling};
use crate::policy::PolicyDocument;
use serde::{Deserialize, Serialize};

/// Wire protocol of a listener or target pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
    Https,
}

/// How targets register in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlacementType {
    /// Task network interfaces register directly
    #[default]
    Ip,
    Instance,
}

/// Which shared load balancer a resource lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerScope {
    /// Internet-facing
    Public,
    /// Internal, reachable only from inside the network
    Private,
}

/// Health check of a target pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    pub path: String,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub success_codes: String,
}

impl HealthCheckSpec {
    /// Default thresholds on the given path
    pub fn on_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for HealthCheckSpec {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            interval_seconds: health_check::INTERVAL_SECONDS,
            timeout_seconds: health_check::TIMEOUT_SECONDS,
            healthy_threshold: health_check::HEALTHY_THRESHOLD,
            unhealthy_threshold: health_check::UNHEALTHY_THRESHOLD,
            success_codes: health_check::SUCCESS_CODES.to_string(),
        }
    }
}

/// Role of a target pool within a topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolExposure {
    Public,
    PrivatePlaintext,
    PrivateTls,
}

impl PoolExposure {
    pub fn scope(&self) -> LoadBalancerScope {
        match self {
            Self::Public => LoadBalancerScope::Public,
            Self::PrivatePlaintext | Self::PrivateTls => LoadBalancerScope::Private,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::PrivatePlaintext => "private-http",
            Self::PrivateTls => "private-https",
        }
    }
}

/// Health-checked group of service instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPool {
    pub name: String,
    pub exposure: PoolExposure,
    pub protocol: Protocol,
    pub port: u16,
    pub health_check: HealthCheckSpec,
    pub placement: PlacementType,
    pub vpc_id: String,
    #[serde(skip_deserializing)]
    pub arn: String,
}

/// Match condition of a routing rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field", content = "values")]
pub enum RoutingCondition {
    HostHeader(Vec<String>),
    PathPattern(Vec<String>),
}

/// Condition-to-pool mapping evaluated by a listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub name: String,
    pub scope: LoadBalancerScope,
    pub listener_protocol: Protocol,
    pub listener_arn: String,
    pub conditions: Vec<RoutingCondition>,
    /// Logical name of the target pool, always one of the topology's own pools
    pub target_pool: String,
    pub target_pool_arn: String,
    pub priority: u32,
    #[serde(skip_deserializing)]
    pub arn: String,
}

/// Source or destination of a boundary rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum TrafficPeer {
    Boundary(String),
    Cidr(String),
    PrefixList(String),
}

/// Port range; `None` means every port and protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self { from: port, to: port }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRule {
    pub description: String,
    pub ports: Option<PortRange>,
    pub peer: TrafficPeer,
}

impl TrafficRule {
    pub fn tcp(description: impl Into<String>, port: u16, peer: TrafficPeer) -> Self {
        Self {
            description: description.into(),
            ports: Some(PortRange::single(port)),
            peer,
        }
    }

    pub fn all_traffic(description: impl Into<String>, peer: TrafficPeer) -> Self {
        Self {
            description: description.into(),
            ports: None,
            peer,
        }
    }

    pub fn covers_port(&self, port: u16) -> bool {
        self.ports
            .map(|range| range.from <= port && port <= range.to)
            .unwrap_or(true)
    }
}

/// Network security boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityBoundary {
    pub name: String,
    pub vpc_id: String,
    pub ingress: Vec<TrafficRule>,
    pub egress: Vec<TrafficRule>,
    #[serde(skip_deserializing)]
    pub id: String,
}

impl SecurityBoundary {
    /// Whether egress is limited to an explicit allow-list
    pub fn is_egress_restricted(&self) -> bool {
        !self.egress.iter().any(|rule| {
            rule.ports.is_none()
                && rule.peer == TrafficPeer::Cidr(crate::constants::egress::ANY_IPV4.to_string())
        })
    }
}

/// Permission principal assumed by the platform or by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub trust_policy: PolicyDocument,
    pub managed_policy_arns: Vec<String>,
    pub inline_policies: Vec<NamedPolicy>,
    #[serde(skip_deserializing)]
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPolicy {
    pub name: String,
    pub document: PolicyDocument,
}

/// Target pool registration of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerRegistration {
    pub target_pool_arn: String,
    pub container_name: String,
    pub container_port: u16,
}

/// Long-running service object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDeployment {
    pub name: String,
    pub cluster: String,
    pub task_definition_arn: String,
    pub desired_count: u32,
    pub health_check_grace_period_seconds: u32,
    pub subnet_ids: Vec<String>,
    pub security_boundary_ids: Vec<String>,
    pub assign_public_ip: bool,
    pub load_balancers: Vec<LoadBalancerRegistration>,
    #[serde(skip_deserializing)]
    pub arn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMetric {
    #[serde(rename = "ECSServiceAverageCPUUtilization")]
    AverageCpuUtilization,
    #[serde(rename = "ECSServiceAverageMemoryUtilization")]
    AverageMemoryUtilization,
}

/// Target-tracking policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub name: String,
    pub metric: ScalingMetric,
    pub target_value: f64,
    pub scale_in_cooldown_seconds: u32,
    pub scale_out_cooldown_seconds: u32,
}

impl ScalingPolicy {
    pub fn target_tracking(name: impl Into<String>, metric: ScalingMetric) -> Self {
        Self {
            name: name.into(),
            metric,
            target_value: scaling::TARGET_UTILIZATION_PERCENT,
            scale_in_cooldown_seconds: scaling::SCALE_IN_COOLDOWN_SECONDS,
            scale_out_cooldown_seconds: scaling::SCALE_OUT_COOLDOWN_SECONDS,
        }
    }
}

/// Scalable target plus its tracking policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    /// `service/<cluster>/<service>`
    pub resource_id: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub policies: Vec<ScalingPolicy>,
}

/// Everything provisioned for one long-running service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceTopology {
    pub service_name: String,
    pub boundary: SecurityBoundary,
    pub target_pools: Vec<TargetPool>,
    pub routing_rules: Vec<RoutingRule>,
    pub execution_identity: ServiceIdentity,
    pub task_identity: ServiceIdentity,
    pub task_definition: TaskDefinition,
    pub service: ServiceDeployment,
    pub capacity: CapacityPolicy,
}

impl ServiceTopology {
    /// The internet-facing pool every service has
    pub fn public_target_pool(&self) -> Option<&TargetPool> {
        self.target_pools
            .iter()
            .find(|pool| pool.exposure == PoolExposure::Public)
    }

    pub fn target_pool_arns(&self) -> Vec<String> {
        self.target_pools.iter().map(|pool| pool.arn.clone()).collect()
    }

    pub fn rules_on(&self, scope: LoadBalancerScope) -> impl Iterator<Item = &RoutingRule> {
        self.routing_rules
            .iter()
            .filter(move |rule| rule.scope == scope)
    }
}
