//! Configuration System
//!
//! Layered configuration for threaded queries: merge policy defaults, the
//! global config file, workspace config files, then `THREADED_QUERY_*`
//! environment variables. Tests included.

use crate::error::SetupError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryServiceConfig {
    /// Worker thread settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for one threaded query's worker and its callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Bound on the startup handshake wait (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Bound on each command result wait (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Worker threads are named `<prefix>-<query id>`
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_timeout_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_thread_name_prefix() -> String {
    "query-worker".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            startup_timeout_ms: default_timeout_ms(),
            command_timeout_ms: default_timeout_ms(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl WorkerConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Both waits bounded by the same duration.
    pub fn with_timeout(timeout: Duration) -> Self {
        let millis = timeout.as_millis() as u64;
        Self {
            startup_timeout_ms: millis,
            command_timeout_ms: millis,
            ..Self::default()
        }
    }

    /// Validate worker settings, reporting every problem.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.startup_timeout_ms == 0 {
            errors.push("startup_timeout_ms must be greater than zero".to_string());
        }
        if self.command_timeout_ms == 0 {
            errors.push("command_timeout_ms must be greater than zero".to_string());
        }
        if self.thread_name_prefix.trim().is_empty() {
            errors.push("thread_name_prefix cannot be empty".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Worker(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Worker(msg) => write!(f, "Worker: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl QueryServiceConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(worker_errors) = self.worker.validate() {
            errors.extend(worker_errors.into_iter().map(ValidationError::Worker));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one setup error.
    pub fn validated(self) -> Result<Self, SetupError> {
        self.validate().map_err(|errors| {
            SetupError::Validation(errors.iter().map(|e| e.to_string()).collect())
        })?;
        Ok(self)
    }
}
