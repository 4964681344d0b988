use handoff_config::shared::RunnerConfig;
use handoff_config::{load_config, load_config_from};
use std::path::Path;
use tracing::debug;

use crate::error::{RunnerError, RunnerResult};

/// Directory probed for configuration files when none is given on the command line.
const DEFAULT_CONFIGURATION_DIR: &str = "configuration";

/// Loads the runner configuration.
///
/// Reads layered files from `configuration_dir` when given, otherwise from `./configuration`
/// if it exists. Falls back to built-in defaults when there is nothing to read. The result
/// is not validated yet, since command line overrides are applied on top of it.
pub fn load_runner_config(configuration_dir: Option<&Path>) -> RunnerResult<RunnerConfig> {
    let config = match configuration_dir {
        Some(directory) => load_config_from::<RunnerConfig>(directory),
        None if Path::new(DEFAULT_CONFIGURATION_DIR).is_dir() => load_config::<RunnerConfig>(),
        None => {
            debug!("no configuration directory found, using defaults");
            return Ok(RunnerConfig::default());
        }
    };

    config.map_err(RunnerError::config)
}
