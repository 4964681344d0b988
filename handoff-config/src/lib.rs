//! Configuration types and loading for handoff pipelines.
//!
//! [`shared`] holds the serde types shared by the library and the runner, [`load_config`] builds
//! them from configuration files and `APP_`-prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
