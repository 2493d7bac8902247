//! Merge rules: defaults first, later sources override earlier ones.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

use crate::config::WorkerConfig;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    let worker = WorkerConfig::default();
    Config::builder()
        .set_default("worker.startup_timeout_ms", worker.startup_timeout_ms)?
        .set_default("worker.command_timeout_ms", worker.command_timeout_ms)?
        .set_default("worker.thread_name_prefix", worker.thread_name_prefix)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stdout")
}
