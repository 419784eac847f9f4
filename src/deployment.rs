//! # Deployment Entry Point
//!
//! Drives one deployment apply:
//!
//! 1. stores the deployment's secrets and collects their references
//! 2. composes the shared load balancers
//! 3. composes the topology of each long-running service (API, console)
//! 4. composes the migration task definition with its own identities
//! 5. runs the migration task, gated by the dry-run and execute flags
//!
//! Composition is synchronous; only the migration run suspends.

use crate::config::{DeployConfig, ServiceOverrides, ServicesConfig};
use crate::constants::{egress, migration, task_sizing};
use crate::context::DeploymentContext;
use crate::environment::{
    migration_environment, migration_secret_names, secret_values, select_secrets,
    service_environment, service_secret_names,
};
use crate::error::DeployResult;
use crate::logdriver::{LogDriver, LogDriverConfig};
use crate::logging::log_error;
use crate::migration::{MigrationOutcome, MigrationTaskOrchestrator, PlacementConfig, TaskPlatform};
use crate::policy::AccessPolicyKind;
use crate::secrets::{RegistrySecretsProvider, SecretsProvider};
use crate::topology::{
    compose_identities, compose_shared_load_balancers, declare_task_definition,
    CompositionError, CompositionStep, ContainerDefinition, IdentityPair, LoadBalancer,
    ResourceDeclaration, ResourceKind, ResourceRegistry, SecretReference, SecurityBoundary,
    ServiceRole, ServiceSpec, ServiceTopology, ServiceTopologyComposer, SharedLoadBalancers,
    TaskDefinition, TaskSizing, TrafficPeer, TrafficRule,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Container name and identity prefix of the migration task
const MIGRATION_COMPONENT: &str = migration::CONTAINER_NAME;

/// Everything needed to launch the migration task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationTaskPlan {
    pub boundary: SecurityBoundary,
    pub identities: IdentityPair,
    pub task_definition: TaskDefinition,
    pub placement: PlacementConfig,
}

/// Composed resource graph of a whole deployment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentPlan {
    pub shared: SharedLoadBalancers,
    pub services: Vec<ServiceTopology>,
    pub migration: MigrationTaskPlan,
}

/// Load balancer outputs consumed by the DNS collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerOutputs {
    pub dns_name: String,
    pub zone_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOutputs {
    pub name: String,
    pub target_pool_arns: Vec<String>,
    pub execution_identity_arn: String,
    pub task_identity_arn: String,
}

/// Values handed to downstream collaborators after an apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentOutputs {
    pub public_load_balancer: LoadBalancerOutputs,
    pub private_load_balancer: Option<LoadBalancerOutputs>,
    pub services: Vec<ServiceOutputs>,
    pub migration_task_definition: String,
    pub migration: MigrationOutcome,
}

impl DeploymentOutputs {
    pub fn new(plan: &DeploymentPlan, migration: MigrationOutcome) -> Self {
        let endpoint = |lb: &LoadBalancer| LoadBalancerOutputs {
            dns_name: lb.dns_name.clone(),
            zone_id: lb.zone_id.clone(),
        };

        Self {
            public_load_balancer: endpoint(&plan.shared.public),
            private_load_balancer: plan.shared.private.as_ref().map(endpoint),
            services: plan
                .services
                .iter()
                .map(|topology| ServiceOutputs {
                    name: topology.service_name.clone(),
                    target_pool_arns: topology.target_pool_arns(),
                    execution_identity_arn: topology.execution_identity.arn.clone(),
                    task_identity_arn: topology.task_identity.arn.clone(),
                })
                .collect(),
            migration_task_definition: plan.migration.task_definition.arn.clone(),
            migration,
        }
    }
}

/// Compose every resource of the deployment against `registry`
#[instrument(skip_all, fields(stack = %context.stack_name, region = %context.region))]
pub fn compose_deployment(
    context: &DeploymentContext,
    registry: &mut dyn ResourceRegistry,
    logging: &LogDriverConfig,
    services: &ServicesConfig,
) -> DeployResult<DeploymentPlan> {
    let restricted_egress = context.features.restricted_egress;

    let secret_references = {
        let mut provider = RegistrySecretsProvider::new(registry, context.secrets_prefix());
        provider.provide(&secret_values(context), &context.kms_key_id)?
    };

    let shared = compose_shared_load_balancers(context, registry, restricted_egress)?;

    let composer = ServiceTopologyComposer::new(context);
    let mut topologies = Vec::with_capacity(2);
    for (role, overrides) in [
        (ServiceRole::Api, &services.api),
        (ServiceRole::Console, &services.console),
    ] {
        let spec = ServiceSpec::for_role(context, role, overrides);
        let environment = service_environment(context, role, spec.listen_port);
        let spec = spec
            .with_environment(environment)
            .with_secrets(select_secrets(&secret_references, service_secret_names(role)));
        let driver = component_log_driver(context, logging, role.name())?;

        topologies.push(composer.compose_topology(
            registry,
            &spec,
            &shared,
            driver.as_ref(),
            restricted_egress,
        )?);
    }

    let migration_driver = component_log_driver(context, logging, MIGRATION_COMPONENT)?;
    let migration = compose_migration_task(
        context,
        registry,
        migration_driver.as_ref(),
        &services.migration,
        select_secrets(&secret_references, migration_secret_names()),
    )?;

    info!(
        services = topologies.len(),
        migration_task_definition = %migration.task_definition.arn,
        "📦 Deployment composed"
    );

    Ok(DeploymentPlan {
        shared,
        services: topologies,
        migration,
    })
}

/// Log driver of one component, writing to `/<stack>/<component>`
pub fn component_log_driver(
    context: &DeploymentContext,
    logging: &LogDriverConfig,
    component: &str,
) -> DeployResult<Box<dyn LogDriver>> {
    Ok(logging.driver_for(
        &context.region,
        &format!("/{}/{component}", context.stack_name),
        component,
    )?)
}

/// Compose the migration task definition: boundary, identities and task
/// definition, without a service, target pools or scaling
pub fn compose_migration_task(
    context: &DeploymentContext,
    registry: &mut dyn ResourceRegistry,
    log_driver: &dyn LogDriver,
    overrides: &ServiceOverrides,
    secrets: Vec<SecretReference>,
) -> DeployResult<MigrationTaskPlan> {
    let abort = |step: CompositionStep, reason: String| {
        CompositionError::aborted(MIGRATION_COMPONENT, step, reason)
    };
    let database = &context.database;
    let network = &context.network;

    // Image pulls and secret reads go through the task's own interface
    let egress_rules = if context.features.restricted_egress {
        let endpoints = network.private_endpoint_boundary_id.clone().ok_or_else(|| {
            abort(
                CompositionStep::IsolationBoundary,
                "no private endpoint boundary configured".into(),
            )
        })?;
        let storage = network.storage_prefix_list_id.clone().ok_or_else(|| {
            abort(
                CompositionStep::IsolationBoundary,
                "no storage prefix list configured".into(),
            )
        })?;

        vec![
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
            TrafficRule::tcp(
                "private endpoints",
                egress::HTTPS_PORT,
                TrafficPeer::Boundary(endpoints),
            ),
            TrafficRule::tcp(
                "object storage",
                egress::HTTPS_PORT,
                TrafficPeer::PrefixList(storage),
            ),
        ]
    } else {
        vec![TrafficRule::all_traffic(
            "unrestricted",
            TrafficPeer::Cidr(egress::ANY_IPV4.to_string()),
        )]
    };

    let mut boundary = SecurityBoundary {
        name: context.scoped_name(&format!("{MIGRATION_COMPONENT}-boundary")),
        vpc_id: context.network.vpc_id.clone(),
        ingress: Vec::new(),
        egress: egress_rules,
        id: String::new(),
    };
    let handle = ResourceDeclaration::new(&boundary.name, ResourceKind::SecurityBoundary, &boundary)
        .and_then(|declaration| registry.declare(declaration))
        .map_err(|e| abort(CompositionStep::IsolationBoundary, e.to_string()))?;
    boundary.id = handle.id;

    let identities = compose_identities(
        context,
        registry,
        MIGRATION_COMPONENT,
        &[AccessPolicyKind::KeyManagement {
            key: context.kms_key_id.clone(),
        }],
    )?;

    let sizing = TaskSizing::resolve(
        overrides.cpu,
        overrides.memory,
        TaskSizing {
            cpu: task_sizing::MIGRATION_CPU_UNITS,
            memory: task_sizing::MIGRATION_MEMORY_MIB,
        },
    );
    let container = ContainerDefinition {
        name: MIGRATION_COMPONENT.to_string(),
        image: context.image.image_for(ServiceRole::Api.name()),
        essential: true,
        command: Some(vec![MIGRATION_COMPONENT.to_string()]),
        port_mappings: Vec::new(),
        environment: migration_environment(context),
        secrets,
        log_configuration: log_driver.configuration(),
    };
    let task_definition = declare_task_definition(
        registry,
        TaskDefinition::new(
            context.scoped_name(MIGRATION_COMPONENT),
            sizing,
            &identities.execution.arn,
            &identities.task.arn,
            container,
        ),
        [
            identities.execution.name.as_str(),
            identities.task.name.as_str(),
        ],
    )
    .map_err(|e| abort(CompositionStep::TaskDefinition, e.to_string()))?;

    let placement = PlacementConfig {
        subnet_ids: context.network.private_subnet_ids.clone(),
        security_boundary_ids: vec![boundary.id.clone()],
        assign_public_ip: false,
    };

    Ok(MigrationTaskPlan {
        boundary,
        identities,
        task_definition,
        placement,
    })
}

/// Composes a deployment and runs its migration
#[derive(Debug)]
pub struct Deployer {
    context: DeploymentContext,
    logging: LogDriverConfig,
    services: ServicesConfig,
    orchestrator: MigrationTaskOrchestrator,
}

impl Deployer {
    /// Validate `config` and prepare a deployer backed by `platform`
    pub fn new(config: &DeployConfig, platform: Arc<dyn TaskPlatform>) -> DeployResult<Self> {
        config.validate()?;
        let context = DeploymentContext::from_config(config);
        let migration_driver = component_log_driver(&context, &config.logging, MIGRATION_COMPONENT)?;

        Ok(Self {
            orchestrator: MigrationTaskOrchestrator::new(platform)
                .with_log_driver(Arc::from(migration_driver)),
            context,
            logging: config.logging.clone(),
            services: config.services.clone(),
        })
    }

    /// Replace the migration orchestrator (custom clock or polling policy)
    pub fn with_orchestrator(mut self, orchestrator: MigrationTaskOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn context(&self) -> &DeploymentContext {
        &self.context
    }

    pub fn plan(&self, registry: &mut dyn ResourceRegistry) -> DeployResult<DeploymentPlan> {
        compose_deployment(&self.context, registry, &self.logging, &self.services)
    }

    /// Run the composed migration task, honouring the dry-run and execute flags
    pub async fn run_migration(&self, plan: &DeploymentPlan) -> DeployResult<MigrationOutcome> {
        let features = self.context.features;
        let outcome = self
            .orchestrator
            .run_migration(
                &self.context.cluster_name,
                &plan.migration.task_definition.arn,
                &plan.migration.placement,
                features.execute_migrations,
                features.dry_run,
            )
            .await
            .inspect_err(|e| log_error("migration", "run_migration", &e.to_string(), None))?;
        Ok(outcome)
    }

    /// Compose everything, then run the migration
    pub async fn deploy(&self, registry: &mut dyn ResourceRegistry) -> DeployResult<DeploymentOutputs> {
        let plan = self
            .plan(registry)
            .inspect_err(|e| log_error(e.component(), "compose_deployment", &e.to_string(), None))?;
        let migration = self.run_migration(&plan).await?;
        Ok(DeploymentOutputs::new(&plan, migration))
    }
}
