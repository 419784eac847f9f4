//! # Partition-Aware Identifier Resolution
//!
//! Cloud identifiers are written in their canonical, standard-partition form
//! (`arn:aws:...`) throughout the crate. Before an identifier is embedded in a
//! policy document or handed to the control plane it is rewritten for the
//! partition the deployment region belongs to.
//!
//! Two independent transforms share the same partition detection rule:
//!
//! - [`resolve_arn`] rewrites the partition segment of an ARN-like identifier.
//! - [`resolve_service_endpoint`] rewrites a service endpoint hostname
//!   (only the China partition differs, by a `.cn` suffix).
//!
//! Both are pure functions with no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Region prefix selecting the restricted government partition
pub const GOV_REGION_PREFIX: &str = "us-gov-";
/// Region prefix selecting the restricted China partition
pub const CHINA_REGION_PREFIX: &str = "cn-";

/// Errors raised while resolving or validating identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArnError {
    /// Identifier has fewer than two colon-delimited segments
    #[error("Invalid identifier format '{identifier}': expected at least 2 colon-delimited segments")]
    InvalidIdentifierFormat { identifier: String },

    /// Identifier carries a partition segment that does not belong to the region
    #[error("Partition mismatch for '{identifier}': expected '{expected}', found '{found}'")]
    PartitionMismatch {
        identifier: String,
        expected: String,
        found: String,
    },
}

pub type ArnResult<T> = Result<T, ArnError>;

/// Isolated region family with its own ARN namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPartition {
    /// Commercial regions
    #[default]
    Standard,
    /// Restricted government regions (`us-gov-*`)
    GovRestricted,
    /// Restricted China regions (`cn-*`)
    ChinaRestricted,
}

impl DeploymentPartition {
    /// Detect the partition for a region by case-insensitive prefix match
    pub fn from_region(region: &str) -> Self {
        let region = region.trim().to_ascii_lowercase();
        if region.starts_with(GOV_REGION_PREFIX) {
            Self::GovRestricted
        } else if region.starts_with(CHINA_REGION_PREFIX) {
            Self::ChinaRestricted
        } else {
            Self::Standard
        }
    }

    /// Reserved token used in the partition segment of identifiers
    pub fn token(&self) -> &'static str {
        match self {
            Self::Standard => "aws",
            Self::GovRestricted => "aws-us-gov",
            Self::ChinaRestricted => "aws-cn",
        }
    }

    /// Whether identifiers need rewriting for this partition
    pub fn is_restricted(&self) -> bool {
        !matches!(self, Self::Standard)
    }
}

impl fmt::Display for DeploymentPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Rewrite a canonical identifier for the partition of `region`.
///
/// The second colon-delimited segment is replaced with the partition token
/// for restricted partitions; every other segment is left untouched. Standard
/// regions return the identifier unchanged. Already-resolved identifiers are
/// not rewritten twice because the replacement is a plain segment swap.
pub fn resolve_arn(region: &str, canonical_identifier: &str) -> ArnResult<String> {
    let mut segments: Vec<&str> = canonical_identifier.split(':').collect();
    if segments.len() < 2 {
        return Err(ArnError::InvalidIdentifierFormat {
            identifier: canonical_identifier.to_string(),
        });
    }

    let partition = DeploymentPartition::from_region(region);
    if !partition.is_restricted() {
        return Ok(canonical_identifier.to_string());
    }

    segments[1] = partition.token();
    Ok(segments.join(":"))
}

/// Rewrite a service endpoint hostname for the partition of `region`.
///
/// Only the China partition differs: hostnames gain a `.cn` suffix
/// (`ecs-tasks.amazonaws.com` becomes `ecs-tasks.amazonaws.com.cn`). The rule
/// is kept separate from [`resolve_arn`] because hostnames and ARNs diverge in
/// how partitions are encoded.
pub fn resolve_service_endpoint(region: &str, hostname: &str) -> String {
    match DeploymentPartition::from_region(region) {
        DeploymentPartition::ChinaRestricted if !hostname.ends_with(".cn") => {
            format!("{hostname}.cn")
        }
        _ => hostname.to_string(),
    }
}

/// Partition segment of an identifier, if it has one
pub fn partition_segment(identifier: &str) -> ArnResult<&str> {
    identifier
        .split(':')
        .nth(1)
        .ok_or_else(|| ArnError::InvalidIdentifierFormat {
            identifier: identifier.to_string(),
        })
}

/// Verify an identifier belongs to the partition of `region`.
///
/// Canonical standard-partition identifiers are accepted for any region since
/// [`resolve_arn`] rewrites them; anything else must carry the region's token.
pub fn ensure_partition(region: &str, identifier: &str) -> ArnResult<()> {
    let found = partition_segment(identifier)?;
    let expected = DeploymentPartition::from_region(region).token();

    if found == expected || found == DeploymentPartition::Standard.token() {
        return Ok(());
    }

    Err(ArnError::PartitionMismatch {
        identifier: identifier.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

/// Resolve an identifier and verify the result belongs to the region's partition
pub fn resolve_checked(region: &str, canonical_identifier: &str) -> ArnResult<String> {
    ensure_partition(region, canonical_identifier)?;
    let resolved = resolve_arn(region, canonical_identifier)?;

    let expected = DeploymentPartition::from_region(region).token();
    let found = partition_segment(&resolved)?;
    if found != expected {
        return Err(ArnError::PartitionMismatch {
            identifier: resolved.clone(),
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_detection() {
        assert_eq!(
            DeploymentPartition::from_region("us-gov-west-1"),
            DeploymentPartition::GovRestricted
        );
        assert_eq!(
            DeploymentPartition::from_region("US-GOV-EAST-1"),
            DeploymentPartition::GovRestricted
        );
        assert_eq!(
            DeploymentPartition::from_region("cn-northwest-1"),
            DeploymentPartition::ChinaRestricted
        );
        assert_eq!(
            DeploymentPartition::from_region("eu-central-1"),
            DeploymentPartition::Standard
        );
        // Prefix match only
        assert_eq!(
            DeploymentPartition::from_region("eu-cn-1"),
            DeploymentPartition::Standard
        );
    }

    #[test]
    fn test_china_region_rewrites_partition() {
        let resolved = resolve_arn("cn-north-1", "arn:aws:iam::aws:policy/X").unwrap();
        assert_eq!(resolved, "arn:aws-cn:iam::aws:policy/X");
    }

    #[test]
    fn test_standard_region_is_unchanged() {
        let resolved = resolve_arn("us-west-2", "arn:aws:iam::aws:policy/X").unwrap();
        assert_eq!(resolved, "arn:aws:iam::aws:policy/X");
    }

    #[test]
    fn test_gov_region_rewrites_partition() {
        let resolved = resolve_arn("us-gov-east-1", "arn:aws:s3:::bucket/*").unwrap();
        assert_eq!(resolved, "arn:aws-us-gov:s3:::bucket/*");
    }

    #[test]
    fn test_already_resolved_identifier_is_stable() {
        let once = resolve_arn("cn-north-1", "arn:aws:iam::aws:policy/X").unwrap();
        let twice = resolve_arn("cn-north-1", &once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_malformed_identifier() {
        let err = resolve_arn("cn-north-1", "not-an-arn").unwrap_err();
        assert!(matches!(err, ArnError::InvalidIdentifierFormat { .. }));

        // Malformed input is rejected even for standard regions
        assert!(resolve_arn("us-east-1", "").is_err());
    }

    #[test]
    fn test_service_endpoint_resolution() {
        assert_eq!(
            resolve_service_endpoint("cn-north-1", "ecs-tasks.amazonaws.com"),
            "ecs-tasks.amazonaws.com.cn"
        );
        assert_eq!(
            resolve_service_endpoint("cn-north-1", "ecs-tasks.amazonaws.com.cn"),
            "ecs-tasks.amazonaws.com.cn"
        );
        assert_eq!(
            resolve_service_endpoint("us-gov-west-1", "ecs-tasks.amazonaws.com"),
            "ecs-tasks.amazonaws.com"
        );
    }

    #[test]
    fn test_partition_mismatch() {
        let err = ensure_partition("us-east-1", "arn:aws-cn:s3:::bucket").unwrap_err();
        assert_eq!(
            err,
            ArnError::PartitionMismatch {
                identifier: "arn:aws-cn:s3:::bucket".to_string(),
                expected: "aws".to_string(),
                found: "aws-cn".to_string(),
            }
        );

        assert!(ensure_partition("cn-north-1", "arn:aws-cn:s3:::bucket").is_ok());
        assert!(ensure_partition("cn-north-1", "arn:aws:s3:::bucket").is_ok());
        assert!(resolve_checked("us-gov-west-1", "arn:aws-cn:s3:::bucket").is_err());
    }
}
