use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::shared::ValidationError;

/// Lock used to guard a shared counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStrategy {
    /// Non-reentrant mutex. Re-acquiring it from the thread that holds it deadlocks.
    #[default]
    Plain,
    /// Reentrant mutex. The holding thread may re-acquire it any number of times.
    Reentrant,
}

impl LockStrategy {
    /// Returns the snake case name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStrategy::Plain => "plain",
            LockStrategy::Reentrant => "reentrant",
        }
    }
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the concurrent counter workload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CounterConfig {
    /// Number of concurrent workers incrementing the counter.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Number of increments each worker performs.
    #[serde(default = "default_increments_per_worker")]
    pub increments_per_worker: u64,
    /// Lock guarding the counter.
    #[serde(default)]
    pub lock_strategy: LockStrategy,
    /// Delay in milliseconds simulated between the read and the write of each increment.
    #[serde(default)]
    pub critical_section_delay_ms: u64,
}

impl CounterConfig {
    /// Default number of workers.
    pub const DEFAULT_WORKERS: usize = 2;

    /// Default number of increments per worker.
    pub const DEFAULT_INCREMENTS_PER_WORKER: u64 = 1;

    /// Returns the critical section delay, if any.
    pub fn critical_section_delay(&self) -> Option<Duration> {
        (self.critical_section_delay_ms > 0)
            .then(|| Duration::from_millis(self.critical_section_delay_ms))
    }

    /// Validates counter workload settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::WorkersZero);
        }

        Ok(())
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            increments_per_worker: default_increments_per_worker(),
            lock_strategy: LockStrategy::default(),
            critical_section_delay_ms: 0,
        }
    }
}

fn default_workers() -> usize {
    CounterConfig::DEFAULT_WORKERS
}

fn default_increments_per_worker() -> u64 {
    CounterConfig::DEFAULT_INCREMENTS_PER_WORKER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_strategy_uses_snake_case() {
        let strategy: LockStrategy = serde_json::from_str(r#""reentrant""#).unwrap();
        assert_eq!(strategy, LockStrategy::Reentrant);
        assert_eq!(serde_json::to_string(&LockStrategy::Plain).unwrap(), r#""plain""#);
    }

    #[test]
    fn zero_delay_means_no_delay() {
        assert_eq!(CounterConfig::default().critical_section_delay(), None);
    }
}
