use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `logging.level`. Default: `info`.
    #[serde(default = "default_level")]
    pub level: String,

    /// Optional manager logging configuration file. When it has an entry for
    /// `service_name`, that entry's level wins over `level`.
    /// TOML: `logging.log_level_conf`. Example: `/etc/cloudify/logging.conf`.
    #[serde(default)]
    pub log_level_conf: Option<PathBuf>,

    /// Service name looked up in `log_level_conf`.
    /// TOML: `logging.service_name`. Default: `dbstrap`.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Optional file receiving every log line.
    /// TOML: `logging.logs_file`.
    #[serde(default)]
    pub logs_file: Option<PathBuf>,

    /// Optional file receiving error lines only.
    /// TOML: `logging.errors_file`.
    #[serde(default)]
    pub errors_file: Option<PathBuf>,

    /// Restrict every sink to errors.
    /// TOML: `logging.errors_only`. Default: `false`.
    #[serde(default)]
    pub errors_only: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_level_conf: None,
            service_name: default_service_name(),
            logs_file: None,
            errors_file: None,
            errors_only: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "dbstrap".to_string()
}
