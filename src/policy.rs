//! # Access Policy Composition
//!
//! Builds least-privilege access-policy documents as typed values. Callers
//! decide the final encoding (the control plane receives them as JSON via
//! [`PolicyDocument::to_json`]).
//!
//! Three canonical grant shapes exist:
//!
//! - **Object storage**: list/read/write/delete on one or more buckets and every key below them
//! - **Key management**: decrypt and data-key generation on one key
//! - **Secret store**: parameter retrieval below a name prefix plus decrypt on the encrypting key
//!
//! Every resource identifier passes through [`crate::partition::resolve_checked`]
//! before it is embedded, so documents composed for restricted regions never
//! carry a standard-partition ARN.

use crate::partition::{resolve_checked, resolve_service_endpoint, ArnResult};
use serde::{Deserialize, Serialize};

/// Policy language version understood by the control plane
pub const POLICY_VERSION: &str = "2012-10-17";

/// Statement effect. Only grants are ever composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
}

/// Principal block used by trust policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "Service")]
    pub service: Vec<String>,
}

/// A single (effect, actions, resources) grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    #[serde(rename = "Sid", skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    #[serde(rename = "Resource", skip_serializing_if = "Vec::is_empty", default)]
    pub resources: Vec<String>,
}

impl PolicyStatement {
    /// Create an allow statement over the given actions and resources
    pub fn allow<A, R>(sid: &str, actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator<Item = String>,
    {
        Self {
            sid: Some(sid.to_string()),
            effect: Effect::Allow,
            principal: None,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().collect(),
        }
    }
}

/// Structured access-grant document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    /// Every resource referenced by the document
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .flat_map(|statement| statement.resources.iter().map(String::as_str))
    }

    /// Every action granted by the document
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .flat_map(|statement| statement.actions.iter().map(String::as_str))
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Which grant shape to compose
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPolicyKind {
    /// Bucket names (not ARNs)
    ObjectStorage { buckets: Vec<String> },
    /// Key id or full key ARN
    KeyManagement { key: String },
    /// Parameter name prefix plus the key encrypting the parameters
    SecretStore { name_prefix: String, key: String },
}

/// Account and region the documents are composed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyScope<'a> {
    pub region: &'a str,
    pub account_id: &'a str,
}

/// Compose an access policy of the given kind
pub fn compose_access_policy(
    scope: &PolicyScope<'_>,
    kind: &AccessPolicyKind,
) -> ArnResult<PolicyDocument> {
    match kind {
        AccessPolicyKind::ObjectStorage { buckets } => object_storage_policy(scope, buckets),
        AccessPolicyKind::KeyManagement { key } => key_management_policy(scope, key),
        AccessPolicyKind::SecretStore { name_prefix, key } => {
            secret_store_policy(scope, name_prefix, key)
        }
    }
}

/// List/read/write/delete on each bucket and all of its keys
pub fn object_storage_policy(
    scope: &PolicyScope<'_>,
    buckets: &[String],
) -> ArnResult<PolicyDocument> {
    let mut bucket_arns = Vec::with_capacity(buckets.len());
    let mut object_arns = Vec::with_capacity(buckets.len());

    for bucket in buckets {
        bucket_arns.push(resolve_checked(scope.region, &format!("arn:aws:s3:::{bucket}"))?);
        object_arns.push(resolve_checked(
            scope.region,
            &format!("arn:aws:s3:::{bucket}/*"),
        )?);
    }

    Ok(PolicyDocument::new(vec![
        PolicyStatement::allow(
            "ListBuckets",
            ["s3:ListBucket", "s3:GetBucketLocation"],
            bucket_arns,
        ),
        PolicyStatement::allow(
            "ReadWriteObjects",
            ["s3:GetObject", "s3:PutObject", "s3:DeleteObject"],
            object_arns,
        ),
    ]))
}

/// Decrypt and data-key generation on one key
pub fn key_management_policy(scope: &PolicyScope<'_>, key: &str) -> ArnResult<PolicyDocument> {
    let key_arn = key_arn(scope, key)?;
    Ok(PolicyDocument::new(vec![PolicyStatement::allow(
        "UseDataKey",
        ["kms:Decrypt", "kms:GenerateDataKey"],
        [key_arn],
    )]))
}

/// Parameter retrieval below `name_prefix` plus decrypt on the encrypting key
pub fn secret_store_policy(
    scope: &PolicyScope<'_>,
    name_prefix: &str,
    key: &str,
) -> ArnResult<PolicyDocument> {
    let prefix = name_prefix.trim_start_matches('/');
    let parameter_arn = resolve_checked(
        scope.region,
        &format!(
            "arn:aws:ssm:{}:{}:parameter/{prefix}*",
            scope.region, scope.account_id
        ),
    )?;
    let key_arn = key_arn(scope, key)?;

    Ok(PolicyDocument::new(vec![
        PolicyStatement::allow(
            "ReadSecrets",
            ["ssm:GetParameters", "ssm:GetParameter"],
            [parameter_arn],
        ),
        PolicyStatement::allow("DecryptSecrets", ["kms:Decrypt"], [key_arn]),
    ]))
}

/// Trust policy letting the container platform assume an identity
pub fn container_trust_policy(region: &str) -> PolicyDocument {
    let service = resolve_service_endpoint(region, crate::constants::TASK_SERVICE_PRINCIPAL);
    PolicyDocument::new(vec![PolicyStatement {
        sid: None,
        effect: Effect::Allow,
        principal: Some(Principal {
            service: vec![service],
        }),
        actions: vec!["sts:AssumeRole".to_string()],
        resources: Vec::new(),
    }])
}

fn key_arn(scope: &PolicyScope<'_>, key: &str) -> ArnResult<String> {
    if key.starts_with("arn:") {
        resolve_checked(scope.region, key)
    } else {
        resolve_checked(
            scope.region,
            &format!("arn:aws:kms:{}:{}:key/{key}", scope.region, scope.account_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::ArnError;

    fn scope(region: &str) -> PolicyScope<'_> {
        PolicyScope {
            region,
            account_id: "123456789012",
        }
    }

    #[test]
    fn test_object_storage_policy_covers_bucket_and_keys() {
        let doc = object_storage_policy(
            &scope("us-east-1"),
            &["uploads".to_string(), "exports".to_string()],
        )
        .unwrap();

        let resources: Vec<&str> = doc.resources().collect();
        assert!(resources.contains(&"arn:aws:s3:::uploads"));
        assert!(resources.contains(&"arn:aws:s3:::uploads/*"));
        assert!(resources.contains(&"arn:aws:s3:::exports/*"));
        assert!(doc.actions().any(|a| a == "s3:DeleteObject"));
        assert!(doc.actions().any(|a| a == "s3:ListBucket"));
    }

    #[test]
    fn test_restricted_region_never_embeds_standard_arn() {
        let doc = compose_access_policy(
            &scope("cn-north-1"),
            &AccessPolicyKind::SecretStore {
                name_prefix: "/stack/".to_string(),
                key: "1234abcd".to_string(),
            },
        )
        .unwrap();

        assert!(doc.resources().all(|r| r.starts_with("arn:aws-cn:")));
        assert_eq!(
            doc.resources().next(),
            Some("arn:aws-cn:ssm:cn-north-1:123456789012:parameter/stack/*")
        );
    }

    #[test]
    fn test_key_management_accepts_key_id_or_arn() {
        let by_id = key_management_policy(&scope("us-gov-west-1"), "abcd").unwrap();
        assert_eq!(
            by_id.resources().next(),
            Some("arn:aws-us-gov:kms:us-gov-west-1:123456789012:key/abcd")
        );

        let by_arn = key_management_policy(
            &scope("us-gov-west-1"),
            "arn:aws:kms:us-gov-west-1:123456789012:key/abcd",
        )
        .unwrap();
        assert_eq!(by_id, by_arn);
    }

    #[test]
    fn test_wrong_partition_key_is_rejected() {
        let err = key_management_policy(
            &scope("us-east-1"),
            "arn:aws-cn:kms:cn-north-1:123456789012:key/abcd",
        )
        .unwrap_err();
        assert!(matches!(err, ArnError::PartitionMismatch { .. }));
    }

    #[test]
    fn test_document_serializes_with_policy_field_names() {
        let doc = key_management_policy(&scope("us-east-1"), "abcd").unwrap();
        let json = doc.to_json().unwrap();
        assert_eq!(json["Version"], "2012-10-17");
        assert_eq!(json["Statement"][0]["Effect"], "Allow");
        assert!(json["Statement"][0].get("Principal").is_none());
    }

    #[test]
    fn test_trust_policy_uses_partition_hostname() {
        let doc = container_trust_policy("cn-northwest-1");
        let principal = doc.statements[0].principal.as_ref().unwrap();
        assert_eq!(principal.service, vec!["ecs-tasks.amazonaws.com.cn"]);
    }
}
