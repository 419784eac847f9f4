//! # Shared Load Balancers
//!
//! The networking primitives every service topology attaches to: an
//! internet-facing load balancer with plaintext and TLS listeners and, in
//! restricted-egress deployments, an internal counterpart reachable only from
//! inside the network. Services add routing rules to these listeners; they
//! never own a load balancer themselves.

use super::error::{CompositionError, CompositionResult, CompositionStep};
use super::registry::{attributes, ResourceDeclaration, ResourceKind, ResourceRegistry};
use super::types::{LoadBalancerScope, Protocol, SecurityBoundary, TrafficPeer, TrafficRule};
use crate::constants::{egress, listeners};
use crate::context::DeploymentContext;
use serde::{Deserialize, Serialize};
use tracing::info;

const COMPONENT: &str = "shared-load-balancers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub name: String,
    pub protocol: Protocol,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_policy: Option<String>,
    pub load_balancer_arn: String,
    /// Response for requests no routing rule matches
    pub default_status_code: u16,
    #[serde(skip_deserializing)]
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub name: String,
    pub scope: LoadBalancerScope,
    pub subnet_ids: Vec<String>,
    pub boundary: SecurityBoundary,
    pub arn: String,
    /// Stable hostname consumed by the DNS collaborator
    pub dns_name: String,
    pub zone_id: String,
    pub http_listener: Listener,
    pub https_listener: Listener,
}

impl LoadBalancer {
    pub fn listener(&self, protocol: Protocol) -> &Listener {
        match protocol {
            Protocol::Http => &self.http_listener,
            Protocol::Https => &self.https_listener,
        }
    }
}

/// Load balancer pair shared by all services of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedLoadBalancers {
    pub public: LoadBalancer,
    pub private: Option<LoadBalancer>,
}

impl SharedLoadBalancers {
    pub fn get(&self, scope: LoadBalancerScope) -> Option<&LoadBalancer> {
        match scope {
            LoadBalancerScope::Public => Some(&self.public),
            LoadBalancerScope::Private => self.private.as_ref(),
        }
    }
}

#[derive(Serialize)]
struct LoadBalancerProperties<'a> {
    name: &'a str,
    internal: bool,
    subnet_ids: &'a [String],
    security_boundary_ids: Vec<&'a str>,
}

/// Compose the public load balancer and, with restricted egress, the private one
pub fn compose_shared_load_balancers(
    context: &DeploymentContext,
    registry: &mut dyn ResourceRegistry,
    restricted_egress: bool,
) -> CompositionResult<SharedLoadBalancers> {
    let public = compose_load_balancer(context, registry, LoadBalancerScope::Public)?;
    let private = if restricted_egress {
        Some(compose_load_balancer(
            context,
            registry,
            LoadBalancerScope::Private,
        )?)
    } else {
        None
    };

    info!(
        public_dns = %public.dns_name,
        private_dns = private.as_ref().map(|lb| lb.dns_name.as_str()),
        "🌐 Shared load balancers composed"
    );

    Ok(SharedLoadBalancers { public, private })
}

fn compose_load_balancer(
    context: &DeploymentContext,
    registry: &mut dyn ResourceRegistry,
    scope: LoadBalancerScope,
) -> CompositionResult<LoadBalancer> {
    let abort = |reason: String| {
        CompositionError::aborted(COMPONENT, CompositionStep::SharedLoadBalancers, reason)
    };

    let (suffix, internal, subnet_ids, source) = match scope {
        LoadBalancerScope::Public => (
            "public",
            false,
            &context.network.public_subnet_ids,
            TrafficPeer::Cidr(egress::ANY_IPV4.to_string()),
        ),
        LoadBalancerScope::Private => (
            "private",
            true,
            &context.network.private_subnet_ids,
            TrafficPeer::Cidr(context.network.vpc_cidr.clone()),
        ),
    };

    let mut boundary = SecurityBoundary {
        name: context.scoped_name(&format!("{suffix}-lb-boundary")),
        vpc_id: context.network.vpc_id.clone(),
        ingress: vec![
            TrafficRule::tcp("plaintext listener", listeners::HTTP_PORT, source.clone()),
            TrafficRule::tcp("tls listener", listeners::HTTPS_PORT, source),
        ],
        egress: vec![TrafficRule::all_traffic(
            "targets",
            TrafficPeer::Cidr(context.network.vpc_cidr.clone()),
        )],
        id: String::new(),
    };
    let boundary_handle =
        ResourceDeclaration::new(&boundary.name, ResourceKind::SecurityBoundary, &boundary)
            .and_then(|declaration| registry.declare(declaration))
            .map_err(|e| abort(e.to_string()))?;
    boundary.id = boundary_handle.id.clone();

    let name = context.scoped_name(suffix);
    let handle = ResourceDeclaration::new(
        &name,
        ResourceKind::LoadBalancer,
        &LoadBalancerProperties {
            name: &name,
            internal,
            subnet_ids,
            security_boundary_ids: vec![&boundary.id],
        },
    )
    .and_then(|declaration| registry.declare(declaration.depends_on([boundary.name.as_str()])))
    .map_err(|e| abort(e.to_string()))?;

    let dns_name = handle
        .attribute(attributes::DNS_NAME)
        .ok_or_else(|| abort(format!("load balancer '{name}' reported no hostname")))?
        .to_string();
    let zone_id = handle
        .attribute(attributes::ZONE_ID)
        .ok_or_else(|| abort(format!("load balancer '{name}' reported no zone id")))?
        .to_string();

    let certificate_arn = context
        .resolve(&context.certificate_arn)
        .map_err(|e| abort(e.to_string()))?;

    let mut http_listener = Listener {
        name: format!("{name}-http"),
        protocol: Protocol::Http,
        port: listeners::HTTP_PORT,
        certificate_arn: None,
        ssl_policy: None,
        load_balancer_arn: handle.arn.clone(),
        default_status_code: 404,
        arn: String::new(),
    };
    let mut https_listener = Listener {
        name: format!("{name}-https"),
        protocol: Protocol::Https,
        port: listeners::HTTPS_PORT,
        certificate_arn: Some(certificate_arn),
        ssl_policy: Some(listeners::TLS_POLICY.to_string()),
        load_balancer_arn: handle.arn.clone(),
        default_status_code: 404,
        arn: String::new(),
    };

    for listener in [&mut http_listener, &mut https_listener] {
        let listener_handle =
            ResourceDeclaration::new(&listener.name, ResourceKind::Listener, &*listener)
                .and_then(|declaration| registry.declare(declaration.depends_on([name.as_str()])))
                .map_err(|e| abort(e.to_string()))?;
        listener.arn = listener_handle.arn;
    }

    Ok(LoadBalancer {
        name,
        scope,
        subnet_ids: subnet_ids.clone(),
        boundary,
        arn: handle.arn,
        dns_name,
        zone_id,
        http_listener,
        https_listener,
    })
}
