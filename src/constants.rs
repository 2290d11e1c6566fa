// -
// Identity

/// Separator between namespace and name in an identity key
pub(crate) const KEY_SEPARATOR: char = '/';

// -
// Defaults

/// Namespace watched when none is configured
pub(crate) const DEFAULT_NAMESPACE: &str = "default";

/// Environment variable prefix for configuration overrides
pub(crate) const CONFIG_ENV_PREFIX: &str = "CONTROLLER";

/// Log file name inside `monitoring.log_dir`
pub const LOG_FILE_NAME: &str = "controller.log";
