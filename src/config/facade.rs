//! Public config API: load and validate.

use std::path::Path;

use config::File;
use tracing::debug;

use crate::config::merge::merge_policy;
use crate::config::sources::{environment, global_file, workspace_file};
use crate::config::QueryServiceConfig;
use crate::error::SetupError;

/// Loads [`QueryServiceConfig`] from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from files and environment
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables (`THREADED_QUERY_*`)
    /// 2. Workspace config (`config/config.toml`, then `config/{THREADED_QUERY_ENV}.toml`)
    /// 3. Global config (`~/.config/threaded-query/config.toml`)
    /// 4. Defaults
    pub fn load(workspace_root: &Path) -> Result<QueryServiceConfig, SetupError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: QueryServiceConfig = builder.build()?.try_deserialize()?;
        debug!(
            workspace_root = %workspace_root.display(),
            startup_timeout_ms = config.worker.startup_timeout_ms,
            command_timeout_ms = config.worker.command_timeout_ms,
            "Loaded configuration"
        );
        config.validated()
    }

    /// Load configuration from a specific file over the defaults.
    pub fn load_from_file(path: &Path) -> Result<QueryServiceConfig, SetupError> {
        let config: QueryServiceConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        config.validated()
    }
}
