//! # Secrets
//!
//! Containers only ever see secrets by reference. A [`SecretsProvider`] takes
//! resolved (name, value) pairs and hands back references that are safe to
//! embed in a container definition; the platform resolves them at launch.

use crate::topology::container::SecretReference;
use crate::topology::registry::{RegistryError, ResourceDeclaration, ResourceKind, ResourceRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretsError {
    #[error("Secret name must not be empty")]
    EmptyName,

    #[error("Secret '{name}' has no value")]
    EmptyValue { name: String },

    #[error("Failed to store secret '{name}': {source}")]
    StoreFailed {
        name: String,
        #[source]
        source: RegistryError,
    },
}

/// A resolved secret value awaiting storage
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub name: String,
    pub value: String,
}

impl SecretValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("name", &self.name)
            .field("value", &"[MASKED]")
            .finish()
    }
}

/// Secrets collaborator contract
pub trait SecretsProvider {
    /// Store `secrets` encrypted with `key_id` and return one reference per secret,
    /// in input order
    fn provide(
        &mut self,
        secrets: &[SecretValue],
        key_id: &str,
    ) -> Result<Vec<SecretReference>, SecretsError>;
}

#[derive(Serialize)]
struct SecretParameter<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    parameter_type: &'static str,
    key_id: &'a str,
    value: &'a str,
}

/// Stores each secret as an encrypted parameter below a name prefix
pub struct RegistrySecretsProvider<'r> {
    registry: &'r mut dyn ResourceRegistry,
    prefix: String,
    issued: HashMap<String, SecretReference>,
}

impl<'r> RegistrySecretsProvider<'r> {
    pub fn new(registry: &'r mut dyn ResourceRegistry, prefix: impl Into<String>) -> Self {
        Self {
            registry,
            prefix: prefix.into(),
            issued: HashMap::new(),
        }
    }

    fn parameter_name(&self, name: &str) -> String {
        format!("/{}/{name}", self.prefix.trim_matches('/'))
    }
}

impl fmt::Debug for RegistrySecretsProvider<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySecretsProvider")
            .field("prefix", &self.prefix)
            .field("issued", &self.issued.len())
            .finish()
    }
}

impl SecretsProvider for RegistrySecretsProvider<'_> {
    fn provide(
        &mut self,
        secrets: &[SecretValue],
        key_id: &str,
    ) -> Result<Vec<SecretReference>, SecretsError> {
        let mut references = Vec::with_capacity(secrets.len());

        for secret in secrets {
            if secret.name.trim().is_empty() {
                return Err(SecretsError::EmptyName);
            }
            if secret.value.is_empty() {
                return Err(SecretsError::EmptyValue {
                    name: secret.name.clone(),
                });
            }

            if let Some(reference) = self.issued.get(&secret.name) {
                references.push(reference.clone());
                continue;
            }

            let parameter_name = self.parameter_name(&secret.name);
            let handle = ResourceDeclaration::new(
                &parameter_name,
                ResourceKind::SecretParameter,
                &SecretParameter {
                    name: &parameter_name,
                    parameter_type: "SecureString",
                    key_id,
                    value: &secret.value,
                },
            )
            .and_then(|declaration| self.registry.declare(declaration))
            .map_err(|source| SecretsError::StoreFailed {
                    name: secret.name.clone(),
                    source,
                })?;

            debug!(secret = %secret.name, parameter = %parameter_name, "🔐 Secret stored");

            let reference = SecretReference {
                name: secret.name.clone(),
                value_from: handle.arn,
            };
            self.issued.insert(secret.name.clone(), reference.clone());
            references.push(reference);
        }

        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::registry::InMemoryResourceRegistry;

    #[test]
    fn test_references_never_carry_values() {
        let mut registry = InMemoryResourceRegistry::new("us-east-1", "123456789012");
        let mut provider = RegistrySecretsProvider::new(&mut registry, "/acme/");

        let references = provider
            .provide(&[SecretValue::new("DATABASE_PASSWORD", "hunter2")], "key-1")
            .unwrap();

        assert_eq!(references.len(), 1);
        assert_eq!(references[0].name, "DATABASE_PASSWORD");
        assert_eq!(
            references[0].value_from,
            "arn:aws:ssm:us-east-1:123456789012:parameter/acme/DATABASE_PASSWORD"
        );
        assert!(!references[0].value_from.contains("hunter2"));
    }

    #[test]
    fn test_repeated_secret_is_stored_once() {
        let mut registry = InMemoryResourceRegistry::new("us-east-1", "123456789012");
        {
            let mut provider = RegistrySecretsProvider::new(&mut registry, "acme");
            let secret = SecretValue::new("DATABASE_PASSWORD", "hunter2");
            let first = provider.provide(&[secret.clone()], "key-1").unwrap();
            let second = provider.provide(&[secret], "key-1").unwrap();
            assert_eq!(first, second);
        }
        assert_eq!(registry.of_kind(ResourceKind::SecretParameter).len(), 1);
    }

    #[test]
    fn test_empty_value_rejected() {
        let mut registry = InMemoryResourceRegistry::new("us-east-1", "123456789012");
        let mut provider = RegistrySecretsProvider::new(&mut registry, "acme");

        let err = provider
            .provide(&[SecretValue::new("DATABASE_PASSWORD", "")], "key-1")
            .unwrap_err();
        assert_eq!(
            err,
            SecretsError::EmptyValue {
                name: "DATABASE_PASSWORD".to_string()
            }
        );
    }

    #[test]
    fn test_debug_masks_value() {
        let secret = SecretValue::new("TOKEN", "s3cr3t");
        assert!(!format!("{secret:?}").contains("s3cr3t"));
    }
}
