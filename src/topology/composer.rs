//! # Service Topology Composer
//!
//! Builds the resource graph of one long-running service in dependency order:
//!
//! 1. isolation boundary
//! 2. public target pool
//! 3. private target pools and their rules (restricted egress only)
//! 4. public routing rules, each confirmed before anything depends on it
//! 5. execution and task identities
//! 6. task definition
//! 7. service, registered with every target pool
//! 8. elastic capacity policy
//!
//! A failing step aborts the composition with [`CompositionError::CompositionAborted`]
//! naming the step. Nothing is retried or rolled back here; whatever the
//! platform already created is converged by re-running the deployment.

use super::container::{ContainerDefinition, PortMapping, TaskDefinition};
use super::error::{CompositionError, CompositionResult, CompositionStep};
use super::identity::{compose_identities, default_task_grants, IdentityPair};
use super::load_balancer::{LoadBalancer, SharedLoadBalancers};
use super::registry::{RegistryError, ResourceDeclaration, ResourceKind, ResourceRegistry};
use super::service::ServiceSpec;
use super::types::{
    CapacityPolicy, LoadBalancerRegistration, LoadBalancerScope, PlacementType, PoolExposure,
    Protocol, RoutingCondition, RoutingRule, ScalingMetric, ScalingPolicy, SecurityBoundary,
    ServiceDeployment, ServiceTopology, TargetPool, TrafficPeer, TrafficRule,
};
use crate::constants::{egress, scaling, service};
use crate::context::DeploymentContext;
use crate::logdriver::LogDriver;
use crate::logging::log_composition_step;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Composes service topologies against a resource registry
#[derive(Debug, Clone, Copy)]
pub struct ServiceTopologyComposer<'a> {
    context: &'a DeploymentContext,
}

impl<'a> ServiceTopologyComposer<'a> {
    pub fn new(context: &'a DeploymentContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &DeploymentContext {
        self.context
    }

    /// Compose the full topology of `spec`.
    ///
    /// Without restricted egress the result has one target pool and two routing
    /// rules (HTTP and HTTPS on the public load balancer); with it, two private
    /// pools and two private rules are added.
    #[instrument(skip(self, registry, spec, shared, log_driver), fields(service = %spec.name))]
    pub fn compose_topology(
        &self,
        registry: &mut dyn ResourceRegistry,
        spec: &ServiceSpec,
        shared: &SharedLoadBalancers,
        log_driver: &dyn LogDriver,
        restricted_egress: bool,
    ) -> CompositionResult<ServiceTopology> {
        let component = spec.name.as_str();
        let abort = |step: CompositionStep| {
            move |reason: RegistryError| CompositionError::aborted(component, step, reason)
        };

        let private = if restricted_egress {
            Some(shared.private.as_ref().ok_or_else(|| {
                CompositionError::aborted(
                    component,
                    CompositionStep::PrivateTargetPools,
                    "restricted egress requires the private load balancer",
                )
            })?)
        } else {
            None
        };

        // 1
        let boundary = self.compose_boundary(registry, spec, shared, private)?;
        log_composition_step(component, CompositionStep::IsolationBoundary, &boundary.name);

        // 2
        let public_pool = self
            .compose_target_pool(registry, spec, PoolExposure::Public)
            .map_err(abort(CompositionStep::PublicTargetPool))?;
        log_composition_step(component, CompositionStep::PublicTargetPool, &public_pool.name);

        let mut target_pools = vec![public_pool];
        let mut routing_rules = Vec::with_capacity(4);

        // 3
        if let Some(private) = private {
            for (exposure, protocol) in [
                (PoolExposure::PrivatePlaintext, Protocol::Http),
                (PoolExposure::PrivateTls, Protocol::Https),
            ] {
                let step = abort(CompositionStep::PrivateTargetPools);
                let pool = self
                    .compose_target_pool(registry, spec, exposure)
                    .map_err(step)?;
                let rule = self
                    .compose_routing_rule(registry, spec, private, protocol, &pool)
                    .map_err(step)?;
                log_composition_step(component, CompositionStep::PrivateTargetPools, &pool.name);
                target_pools.push(pool);
                routing_rules.push(rule);
            }
        }

        // 4
        for protocol in [Protocol::Https, Protocol::Http] {
            let rule = self
                .compose_routing_rule(registry, spec, &shared.public, protocol, &target_pools[0])
                .map_err(abort(CompositionStep::RoutingRules))?;
            log_composition_step(component, CompositionStep::RoutingRules, &rule.name);
            routing_rules.push(rule);
        }

        // 5
        let IdentityPair { execution, task } = compose_identities(
            self.context,
            registry,
            component,
            &default_task_grants(self.context),
        )?;
        log_composition_step(component, CompositionStep::Identities, &task.name);

        // 6
        let mut port_mappings = vec![PortMapping::tcp(spec.listen_port)];
        if restricted_egress {
            port_mappings.push(PortMapping::tcp(spec.tls_port));
        }
        let container = ContainerDefinition {
            name: spec.name.clone(),
            image: spec.image.clone(),
            essential: true,
            command: spec.command.clone(),
            port_mappings,
            environment: spec.environment.clone(),
            secrets: spec.secrets.clone(),
            log_configuration: log_driver.configuration(),
        };
        let task_definition = declare_task_definition(
            registry,
            TaskDefinition::new(
                self.context.scoped_name(component),
                spec.sizing,
                &execution.arn,
                &task.arn,
                container,
            ),
            [execution.name.as_str(), task.name.as_str()],
        )
        .map_err(abort(CompositionStep::TaskDefinition))?;
        log_composition_step(component, CompositionStep::TaskDefinition, &task_definition.family);

        // 7
        let service = self
            .compose_service(
                registry,
                spec,
                &task_definition,
                &boundary,
                &target_pools,
                &routing_rules,
            )
            .map_err(abort(CompositionStep::Service))?;
        log_composition_step(component, CompositionStep::Service, &service.name);

        // 8
        let capacity = self
            .compose_capacity(registry, &service)
            .map_err(abort(CompositionStep::CapacityPolicy))?;
        log_composition_step(component, CompositionStep::CapacityPolicy, &capacity.resource_id);

        info!(
            service = %spec.name,
            target_pools = target_pools.len(),
            routing_rules = routing_rules.len(),
            restricted_egress,
            "✅ Service topology composed"
        );

        Ok(ServiceTopology {
            service_name: service.name.clone(),
            boundary,
            target_pools,
            routing_rules,
            execution_identity: execution,
            task_identity: task,
            task_definition,
            service,
            capacity,
        })
    }

    fn compose_boundary(
        &self,
        registry: &mut dyn ResourceRegistry,
        spec: &ServiceSpec,
        shared: &SharedLoadBalancers,
        private: Option<&LoadBalancer>,
    ) -> CompositionResult<SecurityBoundary> {
        let abort = |reason: String| {
            CompositionError::aborted(&spec.name, CompositionStep::IsolationBoundary, reason)
        };
        let network = &self.context.network;
        let database = &self.context.database;

        let mut ingress = vec![TrafficRule::tcp(
            "public load balancer",
            spec.listen_port,
            TrafficPeer::Boundary(shared.public.boundary.id.clone()),
        )];
        let mut depends_on = vec![shared.public.boundary.name.clone()];

        let egress_rules = match private {
            None => vec![TrafficRule::all_traffic(
                "unrestricted",
                TrafficPeer::Cidr(egress::ANY_IPV4.to_string()),
            )],
            Some(private) => {
                let private_peer = TrafficPeer::Boundary(private.boundary.id.clone());
                ingress.push(TrafficRule::tcp(
                    "private load balancer",
                    spec.listen_port,
                    private_peer.clone(),
                ));
                ingress.push(TrafficRule::tcp(
                    "private load balancer tls",
                    spec.tls_port,
                    private_peer,
                ));
                depends_on.push(private.boundary.name.clone());

                let mut rules = vec![
                    TrafficRule::tcp(
                        "database boundary",
                        database.port,
                        TrafficPeer::Boundary(database.boundary_id.clone()),
                    ),
                    TrafficRule::tcp(
                        "database network",
                        database.port,
                        TrafficPeer::Cidr(network.vpc_cidr.clone()),
                    ),
                ];

                if spec.needs_private_endpoints {
                    let endpoints = network
                        .private_endpoint_boundary_id
                        .clone()
                        .ok_or_else(|| abort("no private endpoint boundary configured".into()))?;
                    let storage = network
                        .storage_prefix_list_id
                        .clone()
                        .ok_or_else(|| abort("no storage prefix list configured".into()))?;
                    rules.push(TrafficRule::tcp(
                        "private endpoints",
                        egress::HTTPS_PORT,
                        TrafficPeer::Boundary(endpoints),
                    ));
                    rules.push(TrafficRule::tcp(
                        "object storage",
                        egress::HTTPS_PORT,
                        TrafficPeer::PrefixList(storage),
                    ));
                }
                rules
            }
        };

        let mut boundary = SecurityBoundary {
            name: self.context.scoped_name(&format!("{}-boundary", spec.name)),
            vpc_id: network.vpc_id.clone(),
            ingress,
            egress: egress_rules,
            id: String::new(),
        };

        let handle = ResourceDeclaration::new(&boundary.name, ResourceKind::SecurityBoundary, &boundary)
            .and_then(|declaration| registry.declare(declaration.depends_on(depends_on)))
            .map_err(|e| abort(e.to_string()))?;
        boundary.id = handle.id;
        Ok(boundary)
    }

    fn compose_target_pool(
        &self,
        registry: &mut dyn ResourceRegistry,
        spec: &ServiceSpec,
        exposure: PoolExposure,
    ) -> Result<TargetPool, RegistryError> {
        let (protocol, port) = match exposure {
            PoolExposure::Public | PoolExposure::PrivatePlaintext => {
                (Protocol::Http, spec.listen_port)
            }
            PoolExposure::PrivateTls => (Protocol::Https, spec.tls_port),
        };

        let mut pool = TargetPool {
            name: self
                .context
                .scoped_name(&format!("{}-{}", spec.name, exposure.suffix())),
            exposure,
            protocol,
            port,
            health_check: spec.health_check.clone(),
            placement: PlacementType::Ip,
            vpc_id: self.context.network.vpc_id.clone(),
            arn: String::new(),
        };

        let handle =
            registry.declare(ResourceDeclaration::new(&pool.name, ResourceKind::TargetPool, &pool)?)?;
        pool.arn = handle.arn;
        Ok(pool)
    }

    /// Declare a routing rule and wait for its creation to be confirmed
    fn compose_routing_rule(
        &self,
        registry: &mut dyn ResourceRegistry,
        spec: &ServiceSpec,
        load_balancer: &LoadBalancer,
        protocol: Protocol,
        pool: &TargetPool,
    ) -> Result<RoutingRule, RegistryError> {
        let listener = load_balancer.listener(protocol);

        let mut conditions = vec![RoutingCondition::HostHeader(spec.host_headers.clone())];
        if !spec.path_patterns.is_empty() {
            conditions.push(RoutingCondition::PathPattern(spec.path_patterns.clone()));
        }

        let scope = load_balancer.scope;
        let scope_name = match scope {
            LoadBalancerScope::Public => "public",
            LoadBalancerScope::Private => "private",
        };
        let protocol_name = match protocol {
            Protocol::Http => "http",
            Protocol::Https => "https",
        };

        let mut rule = RoutingRule {
            name: self
                .context
                .scoped_name(&format!("{}-{scope_name}-{protocol_name}-rule", spec.name)),
            scope,
            listener_protocol: protocol,
            listener_arn: listener.arn.clone(),
            conditions,
            target_pool: pool.name.clone(),
            target_pool_arn: pool.arn.clone(),
            priority: spec.rule_priority,
            arn: String::new(),
        };

        let handle = registry.declare(
            ResourceDeclaration::new(&rule.name, ResourceKind::RoutingRule, &rule)?
                .depends_on([listener.name.as_str(), pool.name.as_str()]),
        )?;
        registry.confirm(&handle)?;
        debug!(rule = %rule.name, target_pool = %pool.name, "🔀 Routing rule confirmed");

        rule.arn = handle.arn;
        Ok(rule)
    }

    fn compose_service(
        &self,
        registry: &mut dyn ResourceRegistry,
        spec: &ServiceSpec,
        task_definition: &TaskDefinition,
        boundary: &SecurityBoundary,
        target_pools: &[TargetPool],
        routing_rules: &[RoutingRule],
    ) -> Result<ServiceDeployment, RegistryError> {
        let load_balancers = target_pools
            .iter()
            .map(|pool| LoadBalancerRegistration {
                target_pool_arn: pool.arn.clone(),
                container_name: spec.name.clone(),
                container_port: pool.port,
            })
            .collect();

        let mut deployment = ServiceDeployment {
            name: self.context.scoped_name(&format!("{}-service", spec.name)),
            cluster: self.context.cluster_name.clone(),
            task_definition_arn: task_definition.arn.clone(),
            desired_count: spec.desired_count,
            health_check_grace_period_seconds: service::HEALTH_CHECK_GRACE_PERIOD_SECONDS,
            subnet_ids: self.context.network.private_subnet_ids.clone(),
            security_boundary_ids: vec![boundary.id.clone()],
            assign_public_ip: false,
            load_balancers,
            arn: String::new(),
        };

        let depends_on = std::iter::once(task_definition.family.clone())
            .chain(std::iter::once(boundary.name.clone()))
            .chain(target_pools.iter().map(|pool| pool.name.clone()))
            .chain(routing_rules.iter().map(|rule| rule.name.clone()));

        let handle = registry.declare(
            ResourceDeclaration::new(&deployment.name, ResourceKind::Service, &deployment)?
                .depends_on(depends_on),
        )?;
        deployment.arn = handle.arn;
        Ok(deployment)
    }

    fn compose_capacity(
        &self,
        registry: &mut dyn ResourceRegistry,
        deployment: &ServiceDeployment,
    ) -> Result<CapacityPolicy, RegistryError> {
        let resource_id = format!("service/{}/{}", deployment.cluster, deployment.name);
        let target_name = format!("{}-scaling-target", deployment.name);

        #[derive(Serialize)]
        struct ScalableTarget<'a> {
            resource_id: &'a str,
            min_capacity: u32,
            max_capacity: u32,
        }

        registry.declare(
            ResourceDeclaration::new(
                &target_name,
                ResourceKind::ScalableTarget,
                &ScalableTarget {
                    resource_id: &resource_id,
                    min_capacity: scaling::MIN_CAPACITY,
                    max_capacity: scaling::MAX_CAPACITY,
                },
            )?
            .depends_on([deployment.name.as_str()]),
        )?;

        let policies = vec![
            ScalingPolicy::target_tracking(
                format!("{}-cpu-scaling", deployment.name),
                ScalingMetric::AverageCpuUtilization,
            ),
            ScalingPolicy::target_tracking(
                format!("{}-memory-scaling", deployment.name),
                ScalingMetric::AverageMemoryUtilization,
            ),
        ];
        for policy in &policies {
            registry.declare(
                ResourceDeclaration::new(&policy.name, ResourceKind::ScalingPolicy, policy)?
                    .depends_on([target_name.as_str()]),
            )?;
        }

        Ok(CapacityPolicy {
            resource_id,
            min_capacity: scaling::MIN_CAPACITY,
            max_capacity: scaling::MAX_CAPACITY,
            policies,
        })
    }
}

/// Declare a task definition under its family name
pub fn declare_task_definition<I, S>(
    registry: &mut dyn ResourceRegistry,
    mut definition: TaskDefinition,
    depends_on: I,
) -> Result<TaskDefinition, RegistryError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let handle = registry.declare(
        ResourceDeclaration::new(&definition.family, ResourceKind::TaskDefinition, &definition)?
            .depends_on(depends_on),
    )?;
    definition.arn = handle.arn;
    Ok(definition)
}
