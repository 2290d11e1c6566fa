//! Reconciliation Controller Error Hierarchy
//!
//! Errors are grouped by the pipeline stage that raises them. Only startup
//! failures are fatal; everything raised after the initial sync is handled
//! locally (resync, drop or rate-limited requeue) and logged with the
//! affected identity.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Remote collection failures (list, watch, stream interruption)
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Identity could not be derived from an observed object
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Failures raised by a [`crate::Handler`]
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Infrastructure-level failures (tasks, signals, io)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Client could not be built from the endpoint and credentials
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// Full enumeration of the remote collection failed
    #[error("List failed: {0}")]
    List(String),

    /// Opening the change stream failed
    #[error("Watch failed: {0}")]
    Watch(String),

    /// Change stream terminated or reported an error mid-flight
    #[error("Watch stream interrupted: {0}")]
    StreamInterrupted(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Object carries no name
    #[error("object has no name (namespace: {namespace:?})")]
    MissingName { namespace: Option<String> },

    /// Tombstone without any recoverable metadata
    #[error("tombstone carries no recoverable metadata")]
    Unresolvable,

    /// Key string does not match `namespace/name` or `name`
    #[error("unexpected key format: {0:?}")]
    MalformedKey(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// `Handler::init` refused to start
    #[error("Handler init failed: {0}")]
    Init(String),

    /// A single reconcile attempt failed and should be retried
    #[error("Reconcile of {key} failed: {reason}")]
    Failed { key: String, reason: String },

    /// A handler call panicked; treated like a failed attempt
    #[error("Handler panicked while reconciling {key}: {message}")]
    Panicked { key: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("Failed to send shutdown signal: {0}")]
    SignalSenderClosed(String),

    #[error("Notification channel closed")]
    ChannelClosed,

    #[error("Retry timeout after {0:?}")]
    RetryTimeout(Duration),

    #[error("Task failed after {0} retries")]
    RetryExhausted(usize),

    #[error("Metrics endpoint could not bind port {port}: {reason}")]
    MetricsBind { port: u16, reason: String },

    #[error("Shutdown requested")]
    Shutdown,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor used by handlers for a retryable failure.
    pub fn reconcile_failed(
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        HandlerError::Failed {
            key: key.into(),
            reason: reason.into(),
        }
        .into()
    }
}
