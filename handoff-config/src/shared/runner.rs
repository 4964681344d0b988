use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{CounterConfig, PipelineConfig, SchedulerConfig, ValidationError};

/// Top-level configuration of the runner binary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Execution model for workers.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Producer/consumer pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Shared counter workload settings.
    #[serde(default)]
    pub counter: CounterConfig,
}

impl RunnerConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.scheduler.validate()?;
        self.pipeline.validate()?;
        self.counter.validate()?;

        Ok(())
    }
}

impl Config for RunnerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
