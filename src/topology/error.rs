use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Named steps of topology composition, in build order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionStep {
    SharedLoadBalancers,
    IsolationBoundary,
    PublicTargetPool,
    PrivateTargetPools,
    RoutingRules,
    Identities,
    TaskDefinition,
    Service,
    CapacityPolicy,
}

impl fmt::Display for CompositionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SharedLoadBalancers => "shared_load_balancers",
            Self::IsolationBoundary => "isolation_boundary",
            Self::PublicTargetPool => "public_target_pool",
            Self::PrivateTargetPools => "private_target_pools",
            Self::RoutingRules => "routing_rules",
            Self::Identities => "identities",
            Self::TaskDefinition => "task_definition",
            Self::Service => "service",
            Self::CapacityPolicy => "capacity_policy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    /// A build step failed; nothing after it was attempted
    #[error("Composition of '{component}' aborted at step {step}: {reason}")]
    CompositionAborted {
        component: String,
        step: CompositionStep,
        reason: String,
    },
}

impl CompositionError {
    pub fn aborted(component: &str, step: CompositionStep, reason: impl fmt::Display) -> Self {
        Self::CompositionAborted {
            component: component.to_string(),
            step,
            reason: reason.to_string(),
        }
    }

    pub fn step(&self) -> CompositionStep {
        match self {
            Self::CompositionAborted { step, .. } => *step,
        }
    }
}

pub type CompositionResult<T> = Result<T, CompositionError>;
