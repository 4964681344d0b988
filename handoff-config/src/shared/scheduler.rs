use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Execution model used to run workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// All workers share one thread and only yield at suspension points.
    Cooperative,
    /// Workers are spread over a pool of OS threads and may be preempted anywhere.
    #[default]
    Preemptive,
}

/// Scheduler settings for the runner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Execution model.
    #[serde(default)]
    pub kind: SchedulerKind,
    /// Number of OS threads for the preemptive model, defaults to the number of CPUs.
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl SchedulerConfig {
    /// Validates scheduler settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.worker_threads == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "scheduler.worker_threads".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
