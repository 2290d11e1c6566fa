use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_NAMESPACE;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourceConfig {
    /// API server endpoint. Required.
    #[serde(default)]
    pub api_server_url: String,

    /// Path to the kubeconfig holding the credentials. Required.
    #[serde(default)]
    pub kubeconfig: PathBuf,

    /// Namespace whose objects are mirrored
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Period of the full relist (unit: milliseconds). 0 disables it and the
    /// cache is only rebuilt after a stream interruption.
    #[serde(default)]
    pub resync_period_ms: u64,

    /// Capacity of the channel between ingestion and the work queue
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_server_url: String::new(),
            kubeconfig: PathBuf::new(),
            namespace: default_namespace(),
            resync_period_ms: 0,
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl SourceConfig {
    /// # Errors
    /// Returns `Error::InvalidConfig` when the endpoint or credentials are
    /// missing, the endpoint is not http(s), or the namespace is empty.
    pub fn validate(&self) -> Result<()> {
        if self.api_server_url.trim().is_empty() {
            return Err(Error::InvalidConfig("api_server_url is required".into()));
        }

        if !(self.api_server_url.starts_with("https://") || self.api_server_url.starts_with("http://")) {
            return Err(Error::InvalidConfig(format!(
                "api_server_url {} must be an http(s) URL",
                self.api_server_url
            )));
        }

        if self.kubeconfig.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("kubeconfig is required".into()));
        }

        if self.namespace.trim().is_empty() {
            return Err(Error::InvalidConfig("namespace cannot be empty".into()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::InvalidConfig("event_buffer_size must be > 0".into()));
        }

        Ok(())
    }

    pub fn resync_period(&self) -> Option<Duration> {
        match self.resync_period_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_event_buffer_size() -> usize {
    1024
}
