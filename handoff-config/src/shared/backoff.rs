use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Random delay range, in milliseconds, applied between units of work.
///
/// Each delay is drawn uniformly from `[min_ms, max_ms]`. A range of `0..=0` disables the delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackoffConfig {
    /// Lower bound of the delay in milliseconds.
    #[serde(default)]
    pub min_ms: u64,
    /// Upper bound of the delay in milliseconds.
    #[serde(default)]
    pub max_ms: u64,
}

impl BackoffConfig {
    /// Creates a delay range between `min_ms` and `max_ms`.
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Returns `true` if no delay should be applied.
    pub fn is_disabled(&self) -> bool {
        self.max_ms == 0
    }

    /// Returns the lower bound as a [`Duration`].
    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    /// Returns the upper bound as a [`Duration`].
    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Ensures the lower bound does not exceed the upper bound.
    pub fn validate(&self, field: &str) -> Result<(), ValidationError> {
        if self.min_ms > self.max_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: format!("{field}.min_ms"),
                constraint: "must be <= max_ms".to_string(),
            });
        }

        Ok(())
    }
}
