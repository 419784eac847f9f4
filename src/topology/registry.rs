//! # Resource Registry
//!
//! The seam between composition and the cloud control plane. Composers declare
//! typed resources (serialized to JSON properties at this boundary) together
//! with the logical names they depend on; the registry creates them and hands
//! back a handle carrying the platform-assigned identifiers.
//!
//! [`InMemoryResourceRegistry`] is the planning implementation: it enforces
//! the dependency contract (a dependency must already be declared), synthesizes
//! partition-correct identifiers and records declaration order so a plan can be
//! rendered or inspected in tests.

use crate::partition::{resolve_arn, resolve_service_endpoint, ArnError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Resource '{logical_name}' is already declared")]
    DuplicateResource { logical_name: String },

    #[error("Resource '{logical_name}' depends on '{dependency}' which has not been declared")]
    MissingDependency {
        logical_name: String,
        dependency: String,
    },

    #[error("Creation of '{logical_name}' has not been confirmed")]
    NotConfirmed { logical_name: String },

    #[error("Control plane rejected '{logical_name}': {reason}")]
    Rejected { logical_name: String, reason: String },

    #[error("Properties of '{logical_name}' could not be serialized: {reason}")]
    InvalidProperties { logical_name: String, reason: String },

    #[error("Identifier error: {0}")]
    Identifier(#[from] ArnError),
}

/// Kinds of provisioned objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    SecurityBoundary,
    LoadBalancer,
    Listener,
    TargetPool,
    RoutingRule,
    Identity,
    SecretParameter,
    TaskDefinition,
    Service,
    ScalableTarget,
    ScalingPolicy,
}

impl ResourceKind {
    /// (service, resource type) segments of the canonical identifier
    fn arn_parts(&self) -> (&'static str, &'static str) {
        match self {
            Self::SecurityBoundary => ("ec2", "security-group"),
            Self::LoadBalancer => ("elasticloadbalancing", "loadbalancer/app"),
            Self::Listener => ("elasticloadbalancing", "listener/app"),
            Self::TargetPool => ("elasticloadbalancing", "targetgroup"),
            Self::RoutingRule => ("elasticloadbalancing", "listener-rule/app"),
            Self::Identity => ("iam", "role"),
            Self::SecretParameter => ("ssm", "parameter"),
            Self::TaskDefinition => ("ecs", "task-definition"),
            Self::Service => ("ecs", "service"),
            Self::ScalableTarget => ("application-autoscaling", "scalable-target"),
            Self::ScalingPolicy => ("autoscaling", "scalingPolicy"),
        }
    }
}

/// A resource to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDeclaration {
    pub logical_name: String,
    pub kind: ResourceKind,
    pub depends_on: Vec<String>,
    pub properties: serde_json::Value,
}

impl ResourceDeclaration {
    pub fn new<P: Serialize>(
        logical_name: impl Into<String>,
        kind: ResourceKind,
        properties: &P,
    ) -> Result<Self, RegistryError> {
        let logical_name = logical_name.into();
        let properties =
            serde_json::to_value(properties).map_err(|e| RegistryError::InvalidProperties {
                logical_name: logical_name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            logical_name,
            kind,
            depends_on: Vec::new(),
            properties,
        })
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on
            .extend(dependencies.into_iter().map(Into::into));
        self
    }
}

/// Identifiers assigned to a created resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub logical_name: String,
    pub kind: ResourceKind,
    /// Short platform id (e.g. `sg-...`); equal to the ARN for ARN-only kinds
    pub id: String,
    pub arn: String,
    /// Additional outputs such as a load balancer's hostname and zone id
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ResourceHandle {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Output attribute keys
pub mod attributes {
    pub const DNS_NAME: &str = "dns_name";
    pub const ZONE_ID: &str = "zone_id";
}

/// Control-plane collaborator contract
pub trait ResourceRegistry {
    /// Create a resource; every dependency must already exist
    fn declare(&mut self, declaration: ResourceDeclaration) -> Result<ResourceHandle, RegistryError>;

    /// Block until the platform reports the resource as created
    fn confirm(&self, handle: &ResourceHandle) -> Result<(), RegistryError>;

    fn contains(&self, logical_name: &str) -> bool;
}

/// Entry of a rendered plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedResource {
    pub order: usize,
    pub logical_name: String,
    pub kind: ResourceKind,
    pub depends_on: Vec<String>,
    pub arn: String,
    pub properties: serde_json::Value,
}

/// Planning registry used for dry runs and tests
#[derive(Debug, Default)]
pub struct InMemoryResourceRegistry {
    region: String,
    account_id: String,
    declared: Vec<(ResourceDeclaration, ResourceHandle)>,
    index: HashMap<String, usize>,
    rejections: HashMap<ResourceKind, String>,
}

impl InMemoryResourceRegistry {
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            ..Default::default()
        }
    }

    /// Reject every future declaration of `kind` with `reason`
    pub fn reject_kind(mut self, kind: ResourceKind, reason: impl Into<String>) -> Self {
        self.rejections.insert(kind, reason.into());
        self
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    /// Declaration position of a resource
    pub fn position(&self, logical_name: &str) -> Option<usize> {
        self.index.get(logical_name).copied()
    }

    pub fn handle(&self, logical_name: &str) -> Option<&ResourceHandle> {
        self.position(logical_name)
            .map(|position| &self.declared[position].1)
    }

    pub fn declaration(&self, logical_name: &str) -> Option<&ResourceDeclaration> {
        self.position(logical_name)
            .map(|position| &self.declared[position].0)
    }

    /// Declared resources of one kind, in declaration order
    pub fn of_kind(&self, kind: ResourceKind) -> Vec<&ResourceHandle> {
        self.declared
            .iter()
            .filter(|(declaration, _)| declaration.kind == kind)
            .map(|(_, handle)| handle)
            .collect()
    }

    /// Ordered plan of everything declared so far. Secret values are masked.
    pub fn plan(&self) -> Vec<PlannedResource> {
        self.declared
            .iter()
            .enumerate()
            .map(|(order, (declaration, handle))| {
                let mut properties = declaration.properties.clone();
                if declaration.kind == ResourceKind::SecretParameter {
                    if let Some(value) = properties.get_mut("value") {
                        *value = serde_json::Value::String("[MASKED]".to_string());
                    }
                }

                PlannedResource {
                    order,
                    logical_name: declaration.logical_name.clone(),
                    kind: declaration.kind,
                    depends_on: declaration.depends_on.clone(),
                    arn: handle.arn.clone(),
                    properties,
                }
            })
            .collect()
    }

    fn synthesize_handle(
        &self,
        declaration: &ResourceDeclaration,
        order: usize,
    ) -> Result<ResourceHandle, ArnError> {
        let (service, resource_type) = declaration.kind.arn_parts();
        let name = &declaration.logical_name;

        let canonical = match declaration.kind {
            ResourceKind::Identity => {
                format!("arn:aws:iam::{}:{resource_type}/{name}", self.account_id)
            }
            ResourceKind::SecretParameter => format!(
                "arn:aws:ssm:{}:{}:parameter/{}",
                self.region,
                self.account_id,
                name.trim_start_matches('/')
            ),
            ResourceKind::TaskDefinition => format!(
                "arn:aws:{service}:{}:{}:{resource_type}/{name}:1",
                self.region, self.account_id
            ),
            _ => format!(
                "arn:aws:{service}:{}:{}:{resource_type}/{name}/{order:016x}",
                self.region, self.account_id
            ),
        };
        let arn = resolve_arn(&self.region, &canonical)?;

        let id = match declaration.kind {
            ResourceKind::SecurityBoundary => format!("sg-{order:017x}"),
            _ => arn.clone(),
        };

        let mut outputs = BTreeMap::new();
        if declaration.kind == ResourceKind::LoadBalancer {
            let hostname = resolve_service_endpoint(
                &self.region,
                &format!("{name}-{order}.{}.elb.amazonaws.com", self.region),
            );
            outputs.insert(attributes::DNS_NAME.to_string(), hostname);
            outputs.insert(attributes::ZONE_ID.to_string(), format!("Z{order:013}"));
        }

        Ok(ResourceHandle {
            logical_name: name.clone(),
            kind: declaration.kind,
            id,
            arn,
            attributes: outputs,
        })
    }
}

impl ResourceRegistry for InMemoryResourceRegistry {
    fn declare(&mut self, declaration: ResourceDeclaration) -> Result<ResourceHandle, RegistryError> {
        let logical_name = declaration.logical_name.clone();

        if self.index.contains_key(&logical_name) {
            return Err(RegistryError::DuplicateResource { logical_name });
        }

        if let Some(dependency) = declaration
            .depends_on
            .iter()
            .find(|dependency| !self.index.contains_key(dependency.as_str()))
        {
            return Err(RegistryError::MissingDependency {
                logical_name,
                dependency: dependency.clone(),
            });
        }

        if let Some(reason) = self.rejections.get(&declaration.kind) {
            return Err(RegistryError::Rejected {
                logical_name,
                reason: reason.clone(),
            });
        }

        let order = self.declared.len();
        let handle = self.synthesize_handle(&declaration, order)?;

        debug!(
            logical_name = %logical_name,
            kind = ?declaration.kind,
            depends_on = ?declaration.depends_on,
            "📐 Resource declared"
        );

        self.index.insert(logical_name, order);
        self.declared.push((declaration, handle.clone()));
        Ok(handle)
    }

    fn confirm(&self, handle: &ResourceHandle) -> Result<(), RegistryError> {
        if self.index.contains_key(&handle.logical_name) {
            Ok(())
        } else {
            Err(RegistryError::NotConfirmed {
                logical_name: handle.logical_name.clone(),
            })
        }
    }

    fn contains(&self, logical_name: &str) -> bool {
        self.index.contains_key(logical_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declaration<P: Serialize>(
        logical_name: &str,
        kind: ResourceKind,
        properties: &P,
    ) -> ResourceDeclaration {
        ResourceDeclaration::new(logical_name, kind, properties).unwrap()
    }

    #[test]
    fn test_dependencies_must_exist() {
        let mut registry = InMemoryResourceRegistry::new("us-east-1", "123456789012");
        let err = registry
            .declare(
                declaration("rule", ResourceKind::RoutingRule, &json!({}))
                    .depends_on(["pool"]),
            )
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::MissingDependency {
                logical_name: "rule".to_string(),
                dependency: "pool".to_string(),
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let mut registry = InMemoryResourceRegistry::new("us-east-1", "123456789012");
        registry
            .declare(declaration("pool", ResourceKind::TargetPool, &json!({})))
            .unwrap();
        let err = registry
            .declare(declaration("pool", ResourceKind::TargetPool, &json!({})))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateResource { .. }));
    }

    #[test]
    fn test_identifiers_follow_partition() {
        let mut registry = InMemoryResourceRegistry::new("cn-north-1", "123456789012");
        let role = registry
            .declare(declaration("acme-api-task", ResourceKind::Identity, &json!({})))
            .unwrap();
        assert_eq!(role.arn, "arn:aws-cn:iam::123456789012:role/acme-api-task");

        let lb = registry
            .declare(declaration("acme-public", ResourceKind::LoadBalancer, &json!({})))
            .unwrap();
        assert!(lb.attribute(attributes::DNS_NAME).unwrap().ends_with(".amazonaws.com.cn"));
        assert!(lb.attribute(attributes::ZONE_ID).is_some());
    }

    #[test]
    fn test_plan_preserves_order_and_rejections() {
        let mut registry = InMemoryResourceRegistry::new("us-east-1", "123456789012")
            .reject_kind(ResourceKind::Service, "quota exceeded");

        let sg = registry
            .declare(declaration("sg", ResourceKind::SecurityBoundary, &json!({"a": 1})))
            .unwrap();
        assert!(sg.id.starts_with("sg-"));
        assert!(registry.confirm(&sg).is_ok());

        let err = registry
            .declare(declaration("svc", ResourceKind::Service, &json!({})))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Rejected { .. }));

        let plan = registry.plan();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].logical_name, "sg");
        assert_eq!(plan[0].properties, json!({"a": 1}));
    }

    #[test]
    fn test_plan_masks_secret_values() {
        let mut registry = InMemoryResourceRegistry::new("us-east-1", "123456789012");
        registry
            .declare(declaration(
                "/acme/DATABASE_PASSWORD",
                ResourceKind::SecretParameter,
                &json!({"name": "/acme/DATABASE_PASSWORD", "value": "hunter2"}),
            ))
            .unwrap();

        let plan = registry.plan();
        assert_eq!(plan[0].properties["value"], "[MASKED]");
        assert_eq!(plan[0].properties["name"], "/acme/DATABASE_PASSWORD");
    }

    #[test]
    fn test_unserializable_properties_are_rejected() {
        let mut properties = BTreeMap::new();
        properties.insert((80u16, 443u16), "listener pair");

        let err = ResourceDeclaration::new("pairs", ResourceKind::Listener, &properties)
            .unwrap_err();
        match err {
            RegistryError::InvalidProperties { logical_name, reason } => {
                assert_eq!(logical_name, "pairs");
                assert!(reason.contains("key must be a string"));
            }
            other => panic!("Expected InvalidProperties, got {other:?}"),
        }
    }
}
