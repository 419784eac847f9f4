//! # Deployment Plan
//!
//! Loads the deployment configuration, composes every resource against an
//! in-memory registry and prints the resulting plan as JSON. Nothing is
//! created and the migration task is never launched.
//!
//! Usage: `deploy-plan [CONFIG_DIR]` (defaults to `DEPLOY_CONFIG_DIR` or `./config`)

use anyhow::Context;
use deploy_core::config::ConfigManager;
use deploy_core::deployment::{compose_deployment, DeploymentOutputs};
use deploy_core::logging::init_structured_logging;
use deploy_core::migration::{MigrationOutcome, SkipReason};
use deploy_core::topology::InMemoryResourceRegistry;
use deploy_core::DeploymentContext;
use std::path::PathBuf;
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config_dir = std::env::args().nth(1).map(PathBuf::from);
    let manager = ConfigManager::load_from_directory(config_dir)
        .context("failed to load deployment configuration")?;
    let config = manager.config();

    let context = DeploymentContext::from_config(config);
    let mut registry = InMemoryResourceRegistry::new(&context.region, &context.account_id);

    let plan = compose_deployment(&context, &mut registry, &config.logging, &config.services)
        .context("failed to compose deployment")?;
    let outputs = DeploymentOutputs::new(
        &plan,
        MigrationOutcome::Skipped {
            reason: SkipReason::DryRun,
        },
    );

    info!(
        environment = %manager.environment(),
        resources = registry.len(),
        "📋 Deployment plan ready"
    );

    let document = serde_json::json!({
        "environment": manager.environment(),
        "partition": context.partition.token(),
        "resources": registry.plan(),
        "outputs": outputs,
    });
    println!("{}", serde_json::to_string_pretty(&document)?);

    Ok(())
}
