//! Configuration management for the reconciliation controller.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod monitoring;
mod queue;
mod retry;
mod source;
pub use monitoring::*;
pub use queue::*;
pub use retry::*;
pub use source::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::Result;

/// Main configuration container
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables prefixed `CONTROLLER__` (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ControllerConfig {
    /// Remote collection endpoint, credentials and scope
    #[serde(default)]
    pub source: SourceConfig,
    /// Work queue and worker pool
    #[serde(default)]
    pub queue: QueueConfig,
    /// Retry policies for remote operations
    #[serde(default)]
    pub retry: RetryPolicies,
    /// Metrics and logging
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl ControllerConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Validation is deferred so that file and command-line overrides can
    /// still be applied. Callers MUST call `validate()` before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/controller.toml");
    /// std::env::set_var("CONTROLLER__QUEUE__WORKERS", "4");
    /// let cfg = ControllerConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` naming the first offending setting, e.g.
    /// a missing API server URL or kubeconfig, an empty worker pool, or a
    /// backoff whose base delay exceeds its cap.
    pub fn validate(self) -> Result<Self> {
        self.source.validate()?;
        self.queue.validate()?;
        self.retry.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
