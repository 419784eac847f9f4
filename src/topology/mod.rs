//! # Service Topology
//!
//! Typed resource graph of the long-running services and the composers that
//! declare it, in dependency order, against a [`ResourceRegistry`].

pub mod composer;
pub mod container;
pub mod error;
pub mod identity;
pub mod load_balancer;
pub mod registry;
pub mod service;
pub mod types;

pub use composer::{declare_task_definition, ServiceTopologyComposer};
pub use container::{
    ContainerDefinition, EnvironmentVariable, PortMapping, SecretReference, TaskDefinition,
    TaskSizing,
};
pub use error::{CompositionError, CompositionResult, CompositionStep};
pub use identity::{compose_identities, default_task_grants, IdentityPair};
pub use load_balancer::{compose_shared_load_balancers, LoadBalancer, Listener, SharedLoadBalancers};
pub use registry::{
    InMemoryResourceRegistry, PlannedResource, RegistryError, ResourceDeclaration, ResourceHandle,
    ResourceKind, ResourceRegistry,
};
pub use service::{ServiceRole, ServiceSpec};
pub use types::{
    HealthCheckSpec, LoadBalancerScope, PoolExposure, Protocol, RoutingCondition, RoutingRule,
    SecurityBoundary, ServiceIdentity, ServiceTopology, TargetPool, TrafficPeer, TrafficRule,
};
