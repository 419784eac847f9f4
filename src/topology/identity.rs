//! Execution and task identities.
//!
//! Every workload gets two principals: the execution identity the platform
//! assumes to pull images, ship logs and read secrets, and the task identity the
//! application itself runs as. They are declared separately and never shared.

use super::error::{CompositionError, CompositionResult, CompositionStep};
use super::registry::{ResourceDeclaration, ResourceKind, ResourceRegistry};
use super::types::{NamedPolicy, ServiceIdentity};
use crate::constants::managed_policies;
use crate::context::DeploymentContext;
use crate::policy::{compose_access_policy, container_trust_policy, AccessPolicyKind};
use serde::Serialize;

/// The two principals of one workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityPair {
    pub execution: ServiceIdentity,
    pub task: ServiceIdentity,
}

/// Grants an application container normally needs: its buckets and the
/// deployment key
pub fn default_task_grants(context: &DeploymentContext) -> Vec<AccessPolicyKind> {
    let mut grants = Vec::with_capacity(2);
    if !context.storage.buckets.is_empty() {
        grants.push(AccessPolicyKind::ObjectStorage {
            buckets: context.storage.buckets.clone(),
        });
    }
    grants.push(AccessPolicyKind::KeyManagement {
        key: context.kms_key_id.clone(),
    });
    grants
}

/// Declare the execution and task identities of `component`
pub fn compose_identities(
    context: &DeploymentContext,
    registry: &mut dyn ResourceRegistry,
    component: &str,
    task_grants: &[AccessPolicyKind],
) -> CompositionResult<IdentityPair> {
    let abort = |reason: String| {
        CompositionError::aborted(component, CompositionStep::Identities, reason)
    };
    let scope = context.policy_scope();
    let trust_policy = container_trust_policy(&context.region);

    let baseline = context
        .resolve(managed_policies::TASK_EXECUTION_BASELINE)
        .map_err(|e| abort(e.to_string()))?;
    let secret_access = compose_access_policy(
        &scope,
        &AccessPolicyKind::SecretStore {
            name_prefix: context.secrets_prefix(),
            key: context.kms_key_id.clone(),
        },
    )
    .map_err(|e| abort(e.to_string()))?;

    let execution = ServiceIdentity {
        name: context.scoped_name(&format!("{component}-execution")),
        trust_policy: trust_policy.clone(),
        managed_policy_arns: vec![baseline],
        inline_policies: vec![NamedPolicy {
            name: "secret-access".to_string(),
            document: secret_access,
        }],
        arn: String::new(),
    };

    let inline_policies = task_grants
        .iter()
        .map(|grant| {
            compose_access_policy(&scope, grant).map(|document| NamedPolicy {
                name: grant_name(grant).to_string(),
                document,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| abort(e.to_string()))?;

    let task = ServiceIdentity {
        name: context.scoped_name(&format!("{component}-task")),
        trust_policy,
        managed_policy_arns: Vec::new(),
        inline_policies,
        arn: String::new(),
    };

    let execution = declare_identity(registry, execution).map_err(abort)?;
    let task = declare_identity(registry, task).map_err(abort)?;

    if execution.arn == task.arn {
        return Err(abort(format!(
            "execution and task identities of '{component}' resolved to the same principal"
        )));
    }

    Ok(IdentityPair { execution, task })
}

fn declare_identity(
    registry: &mut dyn ResourceRegistry,
    mut identity: ServiceIdentity,
) -> Result<ServiceIdentity, String> {
    let handle = ResourceDeclaration::new(&identity.name, ResourceKind::Identity, &identity)
        .and_then(|declaration| registry.declare(declaration))
        .map_err(|e| e.to_string())?;
    identity.arn = handle.arn;
    Ok(identity)
}

fn grant_name(grant: &AccessPolicyKind) -> &'static str {
    match grant {
        AccessPolicyKind::ObjectStorage { .. } => "object-storage-access",
        AccessPolicyKind::KeyManagement { .. } => "key-access",
        AccessPolicyKind::SecretStore { .. } => "secret-access",
    }
}
