//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered with the
//! `config` crate, lowest precedence first:
//!
//! 1. `<dir>/base.yaml` (required)
//! 2. `<dir>/<environment>.yaml` (optional)
//! 3. `DEPLOY__SECTION__FIELD` environment variables

use super::error::{ConfigResult, ConfigurationError};
use super::DeployConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "DEPLOY";
/// Separator between prefix, sections and fields in override variables
pub const ENV_SEPARATOR: &str = "__";

/// Loaded and validated configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: DeployConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment,
    /// reading overrides from the process environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Load configuration with an explicit override map instead of the process
    /// environment. Keys use the same `DEPLOY__SECTION__FIELD` form.
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: Option<config::Map<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let base_path = config_directory.join("base.yaml");
        if !base_path.is_file() {
            return Err(ConfigurationError::config_file_not_found(vec![base_path]));
        }

        let override_path = config_directory.join(format!("{environment}.yaml"));
        let env_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(overrides);

        let config: DeployConfig = Config::builder()
            .add_source(File::from(base_path).format(FileFormat::Yaml))
            .add_source(
                File::from(override_path)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(env_source)
            .build()
            .and_then(|built| built.try_deserialize::<DeployConfig>())
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            Self::sanitize_config_for_logging(&config)
                .and_then(|sanitized| serde_json::to_string_pretty(&sanitized))
                .unwrap_or_else(|e| format!("[serialization error: {e}]"))
        );

        info!(
            environment = %environment,
            stack = %config.stack_name,
            region = %config.region,
            restricted_egress = config.features.restricted_egress,
            "⚙️ Deployment configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Configuration with sensitive fields masked, safe to log
    pub fn debug_config(&self) -> serde_json::Result<serde_json::Value> {
        Self::sanitize_config_for_logging(&self.config)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: DEPLOY_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("DEPLOY_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `DEPLOY_CONFIG_DIR` when set, `./config` otherwise
    fn default_config_directory() -> PathBuf {
        env::var("DEPLOY_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn sanitize_config_for_logging(config: &DeployConfig) -> serde_json::Result<serde_json::Value> {
        let mut config_json = serde_json::to_value(config)?;
        mask_sensitive_fields(&mut config_json);
        Ok(config_json)
    }
}

/// Field-name fragments whose values never reach the logs
const SENSITIVE_FIELDS: [&str; 4] = ["password", "secret", "token", "credential"];

fn mask_sensitive_fields(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(fields) => {
            for (name, field) in fields.iter_mut() {
                let name = name.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|fragment| name.contains(fragment)) {
                    *field = serde_json::Value::String("[MASKED]".to_string());
                } else {
                    mask_sensitive_fields(field);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(mask_sensitive_fields),
        _ => {}
    }
}
