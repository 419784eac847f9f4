//! # Deployment Context
//!
//! Explicit, immutable description of the target environment. Every composer
//! receives it as an argument; nothing in the crate reads region, account or
//! network settings from process-wide state.

use crate::config::DeployConfig;
use crate::partition::{resolve_checked, ArnResult, DeploymentPartition};
use crate::policy::PolicyScope;
use serde::{Deserialize, Serialize};

/// Already-resolved networking values supplied by the config collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkContext {
    pub vpc_id: String,
    pub vpc_cidr: String,
    pub public_subnet_ids: Vec<String>,
    pub private_subnet_ids: Vec<String>,
    /// Boundary guarding private service endpoints (restricted egress only)
    #[serde(default)]
    pub private_endpoint_boundary_id: Option<String>,
    /// Managed prefix list of the object storage service (restricted egress only)
    #[serde(default)]
    pub storage_prefix_list_id: Option<String>,
}

/// Relational database the services connect to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DatabaseContext {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: String,
    /// Security boundary attached to the database
    pub boundary_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StorageContext {
    /// Buckets the application reads and writes
    pub buckets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ImageContext {
    /// Registry prefix, e.g. `123456789012.dkr.ecr.us-east-1.amazonaws.com/platform`
    pub registry_prefix: String,
    pub tag: String,
}

impl ImageContext {
    /// Fully qualified image reference for one component
    pub fn image_for(&self, component: &str) -> String {
        format!(
            "{}/{component}:{}",
            self.registry_prefix.trim_end_matches('/'),
            self.tag
        )
    }
}

/// Deployment feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FeatureFlags {
    #[serde(default)]
    pub restricted_egress: bool,
    #[serde(default)]
    pub disable_email_login: bool,
    #[serde(default)]
    pub disable_email_signup: bool,
    #[serde(default)]
    pub saml_enabled: bool,
    #[serde(default)]
    pub execute_migrations: bool,
    #[serde(default)]
    pub dry_run: bool,
}

/// Everything a composer needs to know about the target environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    pub stack_name: String,
    pub region: String,
    pub account_id: String,
    pub partition: DeploymentPartition,
    pub domain: String,
    pub certificate_arn: String,
    pub kms_key_id: String,
    pub cluster_name: String,
    pub network: NetworkContext,
    pub database: DatabaseContext,
    pub storage: StorageContext,
    pub image: ImageContext,
    pub features: FeatureFlags,
}

impl DeploymentContext {
    /// Build the context from loaded configuration
    pub fn from_config(config: &DeployConfig) -> Self {
        let cluster_name = config
            .cluster_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("{}-cluster", config.stack_name));

        Self {
            stack_name: config.stack_name.clone(),
            region: config.region.clone(),
            account_id: config.account_id.clone(),
            partition: DeploymentPartition::from_region(&config.region),
            domain: config.domain.clone(),
            certificate_arn: config.certificate_arn.clone(),
            kms_key_id: config.kms_key_id.clone(),
            cluster_name,
            network: config.network.clone(),
            database: config.database.clone(),
            storage: config.storage.clone(),
            image: config.image.clone(),
            features: config.features,
        }
    }

    pub fn policy_scope(&self) -> PolicyScope<'_> {
        PolicyScope {
            region: &self.region,
            account_id: &self.account_id,
        }
    }

    /// Resolve a canonical identifier for this deployment's partition
    pub fn resolve(&self, canonical_identifier: &str) -> ArnResult<String> {
        resolve_checked(&self.region, canonical_identifier)
    }

    /// Name prefix under which this stack's secrets are stored
    pub fn secrets_prefix(&self) -> String {
        format!("/{}/", self.stack_name)
    }

    /// Resource name scoped to this stack
    pub fn scoped_name(&self, name: &str) -> String {
        format!("{}-{name}", self.stack_name)
    }
}
