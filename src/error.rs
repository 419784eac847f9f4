//! Crate-wide error taxonomy.
//!
//! Component errors keep their own enums; [`DeployError`] wraps them so the
//! deployment entry point can return a single type while every kind stays
//! matchable.

use crate::config::ConfigurationError;
use crate::logdriver::LogDriverError;
use crate::migration::MigrationError;
use crate::partition::ArnError;
use crate::secrets::SecretsError;
use crate::topology::{CompositionError, RegistryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Identifier(#[from] ArnError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    LogDriver(#[from] LogDriverError),

    #[error(transparent)]
    Secrets(#[from] SecretsError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl DeployError {
    /// Component the error originated in, for structured logs
    pub fn component(&self) -> &'static str {
        match self {
            Self::Identifier(_) => "partition",
            Self::Registry(_) => "registry",
            Self::Composition(_) => "topology",
            Self::Migration(_) => "migration",
            Self::LogDriver(_) => "logdriver",
            Self::Secrets(_) => "secrets",
            Self::Configuration(_) => "config",
        }
    }
}

pub type DeployResult<T> = Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::PollPhase;

    #[test]
    fn test_component_errors_convert() {
        let err: DeployError = MigrationError::TimedOut {
            phase: PollPhase::AwaitingRunning,
            attempts: 50,
        }
        .into();
        assert_eq!(err.component(), "migration");
        assert!(err.to_string().contains("awaiting-running"));

        let err: DeployError = ArnError::InvalidIdentifierFormat {
            identifier: "nocolon".to_string(),
        }
        .into();
        assert!(matches!(err, DeployError::Identifier(_)));
    }
}
