//! # Deployment Configuration
//!
//! Typed configuration for one deployment, loaded from layered YAML files and
//! `DEPLOY__*` environment variables by [`ConfigManager`].
//!
//! ## Layout
//!
//! ```text
//! config/
//!   base.yaml          # required, complete configuration
//!   production.yaml    # optional per-environment overrides
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use deploy_core::config::ConfigManager;
//! use deploy_core::context::DeploymentContext;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let context = DeploymentContext::from_config(manager.config());
//! println!("deploying {} to {}", context.stack_name, context.region);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::context::{DatabaseContext, FeatureFlags, ImageContext, NetworkContext, StorageContext};
use crate::logdriver::LogDriverConfig;
use serde::{Deserialize, Serialize};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Per-service sizing overrides. Zero means "use the documented default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceOverrides {
    #[serde(default)]
    pub cpu: u32,
    #[serde(default)]
    pub memory: u32,
    #[serde(default)]
    pub desired_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServicesConfig {
    #[serde(default)]
    pub api: ServiceOverrides,
    #[serde(default)]
    pub console: ServiceOverrides,
    #[serde(default)]
    pub migration: ServiceOverrides,
}

/// Root configuration structure mirroring `base.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    pub stack_name: String,
    pub region: String,
    pub account_id: String,
    /// Public domain; the console answers on it and the API on `api.<domain>`
    pub domain: String,
    pub certificate_arn: String,
    pub kms_key_id: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    pub network: NetworkContext,
    pub database: DatabaseContext,
    pub storage: StorageContext,
    pub image: ImageContext,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub logging: LogDriverConfig,
}

impl DeployConfig {
    /// Validate required fields and value ranges
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let required = [
            ("stack_name", &self.stack_name, "deployment"),
            ("region", &self.region, "deployment"),
            ("account_id", &self.account_id, "deployment"),
            ("domain", &self.domain, "deployment"),
            ("certificate_arn", &self.certificate_arn, "deployment"),
            ("kms_key_id", &self.kms_key_id, "deployment"),
            ("network.vpc_id", &self.network.vpc_id, "network configuration"),
            ("network.vpc_cidr", &self.network.vpc_cidr, "network configuration"),
            ("database.host", &self.database.host, "database configuration"),
            ("database.name", &self.database.name, "database configuration"),
            (
                "database.boundary_id",
                &self.database.boundary_id,
                "database configuration",
            ),
            ("image.registry_prefix", &self.image.registry_prefix, "image configuration"),
            ("image.tag", &self.image.tag, "image configuration"),
        ];

        for (field, value, context) in required {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(field, context));
            }
        }

        if is_key_alias(&self.kms_key_id) {
            return Err(ConfigurationError::invalid_value(
                "kms_key_id",
                self.kms_key_id.clone(),
                "use the key id or key ARN; key grants are evaluated against the key ARN, not an alias",
            ));
        }

        if self.database.port == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.port",
                "0",
                "port must be greater than 0",
            ));
        }

        if self.network.public_subnet_ids.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "network.public_subnet_ids",
                "network configuration",
            ));
        }

        if self.network.private_subnet_ids.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "network.private_subnet_ids",
                "network configuration",
            ));
        }

        if self.storage.buckets.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "storage.buckets",
                "storage configuration",
            ));
        }

        if self.features.restricted_egress
            && (self.network.private_endpoint_boundary_id.is_none()
                || self.network.storage_prefix_list_id.is_none())
        {
            return Err(ConfigurationError::invalid_value(
                "features.restricted_egress",
                "true",
                "restricted egress requires network.private_endpoint_boundary_id and network.storage_prefix_list_id",
            ));
        }

        if serde_json::from_str::<serde_json::Value>(&self.logging.options).is_err() {
            return Err(ConfigurationError::invalid_value(
                "logging.options",
                self.logging.options.clone(),
                "log driver options must be a JSON object",
            ));
        }

        Ok(())
    }
}

/// `alias/<name>` or `arn:<partition>:kms:<region>:<account>:alias/<name>`
fn is_key_alias(key: &str) -> bool {
    let resource = if key.starts_with("arn:") {
        key.splitn(6, ':').nth(5).unwrap_or_default()
    } else {
        key
    };
    resource.starts_with("alias/")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) const SAMPLE_YAML: &str = r#"
stack_name: acme
region: us-east-1
account_id: "123456789012"
domain: acme.example.com
certificate_arn: arn:aws:acm:us-east-1:123456789012:certificate/cert-1
kms_key_id: key-1
network:
  vpc_id: vpc-1
  vpc_cidr: 10.0.0.0/16
  public_subnet_ids: [subnet-pub-a, subnet-pub-b]
  private_subnet_ids: [subnet-priv-a, subnet-priv-b]
  private_endpoint_boundary_id: sg-endpoints
  storage_prefix_list_id: pl-s3
database:
  host: db.internal
  port: 5432
  name: acme
  username: acme
  password: hunter2
  boundary_id: sg-db
storage:
  buckets: [acme-uploads]
image:
  registry_prefix: registry.example.com/acme
  tag: 1.2.3
features:
  execute_migrations: true
"#;

    pub(crate) fn sample_config() -> DeployConfig {
        serde_json::from_value(serde_json::json!({
            "stack_name": "acme",
            "region": "us-east-1",
            "account_id": "123456789012",
            "domain": "acme.example.com",
            "certificate_arn": "arn:aws:acm:us-east-1:123456789012:certificate/cert-1",
            "kms_key_id": "key-1",
            "network": {
                "vpc_id": "vpc-1",
                "vpc_cidr": "10.0.0.0/16",
                "public_subnet_ids": ["subnet-pub-a"],
                "private_subnet_ids": ["subnet-priv-a"],
                "private_endpoint_boundary_id": "sg-endpoints",
                "storage_prefix_list_id": "pl-s3"
            },
            "database": {
                "host": "db.internal",
                "port": 5432,
                "name": "acme",
                "username": "acme",
                "password": "hunter2",
                "boundary_id": "sg-db"
            },
            "storage": { "buckets": ["acme-uploads"] },
            "image": { "registry_prefix": "registry.example.com/acme", "tag": "1.2.3" }
        }))
        .expect("sample config deserializes")
    }
}
