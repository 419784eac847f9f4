#![allow(clippy::doc_markdown)] // Allow technical terms like FireLens, ARN in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Deploy Core Rust
//!
//! Deployment core for a containerized web platform: composes the long-running
//! services behind shared load balancers and runs the one-shot database
//! migration task that has to succeed before a release is considered live.
//!
//! ## Overview
//!
//! A deployment is described once by a [`DeploymentContext`] built from
//! configuration. Composers turn that context into a typed resource graph,
//! declaring every resource against a [`ResourceRegistry`] in dependency
//! order. The migration orchestrator then drives a task through the container
//! platform and reports how it ended.
//!
//! ## Module Organization
//!
//! - [`partition`] - Rewrites canonical identifiers for the deployment's partition
//! - [`policy`] - Access policy documents scoped to one region and account
//! - [`topology`] - Load balancers, target pools, routing rules, identities and services
//! - [`migration`] - One-shot migration task orchestration with bounded polling
//! - [`secrets`] - Stores secret values and hands back references
//! - [`logdriver`] - Container log shipping backends
//! - [`deployment`] - End-to-end apply: composition followed by the migration run
//! - [`config`] - Layered configuration loading and validation
//! - [`error`] - Crate-level error aggregation
//! - [`logging`] - Structured logging initialization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deploy_core::config::ConfigManager;
//! use deploy_core::deployment::compose_deployment;
//! use deploy_core::topology::InMemoryResourceRegistry;
//! use deploy_core::DeploymentContext;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?;
//! let context = DeploymentContext::from_config(config.config());
//! let mut registry = InMemoryResourceRegistry::new(&context.region, &context.account_id);
//!
//! let plan = compose_deployment(
//!     &context,
//!     &mut registry,
//!     &config.config().logging,
//!     &config.config().services,
//! )?;
//! println!("composed {} services", plan.services.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod deployment;
pub mod environment;
pub mod error;
pub mod logdriver;
pub mod logging;
pub mod migration;
pub mod partition;
pub mod policy;
pub mod secrets;
pub mod topology;

pub use config::{ConfigManager, ConfigurationError, DeployConfig};
pub use context::{DeploymentContext, FeatureFlags};
pub use deployment::{compose_deployment, Deployer, DeploymentOutputs, DeploymentPlan};
pub use error::{DeployError, DeployResult};
pub use logdriver::{create_log_driver, LogDriver, LogDriverConfig, LogDriverKind};
pub use migration::{
    MigrationError, MigrationOutcome, MigrationTaskOrchestrator, PollPolicy, TaskPlatform,
};
pub use partition::{resolve_arn, resolve_service_endpoint, ArnError, DeploymentPartition};
pub use policy::{AccessPolicyKind, PolicyDocument};
pub use topology::{
    CompositionError, InMemoryResourceRegistry, ResourceRegistry, ServiceTopology,
    ServiceTopologyComposer,
};
