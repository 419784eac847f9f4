//! Configuration and context builders shared by the integration tests.

use deploy_core::config::DeployConfig;
use deploy_core::context::DeploymentContext;
use deploy_core::migration::PlacementConfig;
use serde_json::json;

/// Complete configuration for a stack called `acme` in `region`
pub fn sample_config(region: &str) -> DeployConfig {
    serde_json::from_value(json!({
        "stack_name": "acme",
        "region": region,
        "account_id": "123456789012",
        "domain": "acme.example.com",
        "certificate_arn": format!("arn:aws:acm:{region}:123456789012:certificate/cert-1"),
        "kms_key_id": "key-1",
        "network": {
            "vpc_id": "vpc-1",
            "vpc_cidr": "10.0.0.0/16",
            "public_subnet_ids": ["subnet-pub-a", "subnet-pub-b"],
            "private_subnet_ids": ["subnet-priv-a", "subnet-priv-b"],
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
        "storage": { "buckets": ["acme-uploads", "acme-exports"] },
        "image": { "registry_prefix": "registry.example.com/acme", "tag": "1.2.3" },
        "features": { "execute_migrations": true }
    }))
    .expect("sample config deserializes")
}

pub fn sample_context(region: &str) -> DeploymentContext {
    DeploymentContext::from_config(&sample_config(region))
}

pub fn restricted_context(region: &str) -> DeploymentContext {
    let mut config = sample_config(region);
    config.features.restricted_egress = true;
    DeploymentContext::from_config(&config)
}

pub fn sample_placement() -> PlacementConfig {
    PlacementConfig {
        subnet_ids: vec!["subnet-priv-a".to_string()],
        security_boundary_ids: vec!["sg-migrate".to_string()],
        assign_public_ip: false,
    }
}

pub const MIGRATION_TASK_DEFINITION: &str =
    "arn:aws:ecs:us-east-1:123456789012:task-definition/acme-migrate:7";
