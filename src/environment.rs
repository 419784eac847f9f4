//! Environment and secret lists shared by the API, console and migration
//! containers.

use crate::context::DeploymentContext;
use crate::secrets::SecretValue;
use crate::topology::container::{EnvironmentVariable, SecretReference};
use crate::topology::service::ServiceRole;

/// Variable names read by the application images
pub mod names {
    pub const PORT: &str = "PORT";
    pub const REGION: &str = "AWS_REGION";
    pub const DATABASE_HOST: &str = "DATABASE_HOST";
    pub const DATABASE_PORT: &str = "DATABASE_PORT";
    pub const DATABASE_NAME: &str = "DATABASE_NAME";
    pub const DATABASE_USER: &str = "DATABASE_USER";
    pub const DATABASE_PASSWORD: &str = "DATABASE_PASSWORD";
    pub const STORAGE_BUCKETS: &str = "STORAGE_BUCKETS";
    pub const PUBLIC_URL: &str = "PUBLIC_URL";
    pub const API_URL: &str = "API_URL";
    pub const DISABLE_EMAIL_LOGIN: &str = "DISABLE_EMAIL_LOGIN";
    pub const DISABLE_EMAIL_SIGNUP: &str = "DISABLE_EMAIL_SIGNUP";
    pub const SAML_ENABLED: &str = "SAML_ENABLED";
}

fn database_environment(context: &DeploymentContext) -> Vec<EnvironmentVariable> {
    let database = &context.database;
    vec![
        EnvironmentVariable::new(names::DATABASE_HOST, &database.host),
        EnvironmentVariable::new(names::DATABASE_PORT, database.port),
        EnvironmentVariable::new(names::DATABASE_NAME, &database.name),
        EnvironmentVariable::new(names::DATABASE_USER, &database.username),
    ]
}

fn feature_environment(context: &DeploymentContext) -> Vec<EnvironmentVariable> {
    let features = &context.features;
    vec![
        EnvironmentVariable::new(names::DISABLE_EMAIL_LOGIN, features.disable_email_login),
        EnvironmentVariable::new(names::DISABLE_EMAIL_SIGNUP, features.disable_email_signup),
        EnvironmentVariable::new(names::SAML_ENABLED, features.saml_enabled),
    ]
}

/// Plain environment of a long-running service
pub fn service_environment(
    context: &DeploymentContext,
    role: ServiceRole,
    listen_port: u16,
) -> Vec<EnvironmentVariable> {
    let mut environment = vec![
        EnvironmentVariable::new(names::PORT, listen_port),
        EnvironmentVariable::new(names::REGION, &context.region),
        EnvironmentVariable::new(names::PUBLIC_URL, format!("https://{}", context.domain)),
    ];

    match role {
        ServiceRole::Api => {
            environment.extend(database_environment(context));
            environment.push(EnvironmentVariable::new(
                names::STORAGE_BUCKETS,
                context.storage.buckets.join(","),
            ));
        }
        ServiceRole::Console => {
            environment.push(EnvironmentVariable::new(
                names::API_URL,
                format!("https://{}", ServiceRole::Api.host_header(&context.domain)),
            ));
        }
    }

    environment.extend(feature_environment(context));
    environment
}

/// Plain environment of the migration task
pub fn migration_environment(context: &DeploymentContext) -> Vec<EnvironmentVariable> {
    let mut environment = vec![EnvironmentVariable::new(names::REGION, &context.region)];
    environment.extend(database_environment(context));
    environment
}

/// Every secret value any container of the deployment needs
pub fn secret_values(context: &DeploymentContext) -> Vec<SecretValue> {
    vec![SecretValue::new(
        names::DATABASE_PASSWORD,
        context.database.password.clone(),
    )]
}

/// Names of the secrets a service role receives
pub fn service_secret_names(role: ServiceRole) -> &'static [&'static str] {
    match role {
        ServiceRole::Api => &[names::DATABASE_PASSWORD],
        ServiceRole::Console => &[],
    }
}

/// Names of the secrets the migration task receives
pub fn migration_secret_names() -> &'static [&'static str] {
    &[names::DATABASE_PASSWORD]
}

/// Pick the references named in `wanted`, preserving their order
pub fn select_secrets(references: &[SecretReference], wanted: &[&str]) -> Vec<SecretReference> {
    wanted
        .iter()
        .filter_map(|name| references.iter().find(|reference| reference.name == *name))
        .cloned()
        .collect()
}
