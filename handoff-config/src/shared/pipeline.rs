use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::{BackoffConfig, ValidationError};

/// Configuration for a producer/consumer pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Maximum number of items buffered in the channel between producers and consumers.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Number of producer workers.
    #[serde(default = "default_producers")]
    pub producers: usize,
    /// Number of consumer workers.
    #[serde(default = "default_consumers")]
    pub consumers: usize,
    /// Number of items each producer generates, `None` to produce until shutdown.
    #[serde(default)]
    pub items_per_producer: Option<u64>,
    /// Time budget in milliseconds after which shutdown is raised automatically.
    #[serde(default)]
    pub run_for_ms: Option<u64>,
    /// Maximum time in milliseconds to wait for consumers to drain the channel once producers
    /// stopped. When exceeded, consumers are aborted and their items reported as abandoned.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Delay applied by producers before generating each item.
    #[serde(default)]
    pub producer_backoff: BackoffConfig,
    /// Simulated work applied by consumers to each item.
    #[serde(default)]
    pub consumer_work: BackoffConfig,
    /// Size in bytes of randomly generated payloads.
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
}

impl PipelineConfig {
    /// Default channel capacity.
    pub const DEFAULT_CAPACITY: usize = 10;

    /// Default number of producers.
    pub const DEFAULT_PRODUCERS: usize = 1;

    /// Default number of consumers.
    pub const DEFAULT_CONSUMERS: usize = 1;

    /// Default drain timeout: 30 seconds.
    pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 30_000;

    /// Default payload size in bytes.
    pub const DEFAULT_PAYLOAD_SIZE: usize = 5;

    /// Creates a configuration with the given sizes and defaults for everything else.
    pub fn new(capacity: usize, producers: usize, consumers: usize) -> Self {
        Self {
            capacity,
            producers,
            consumers,
            ..Self::default()
        }
    }

    /// Returns the drain timeout as a [`Duration`].
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Returns the time budget as a [`Duration`], if any.
    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_ms.map(Duration::from_millis)
    }

    /// Validates pipeline configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.capacity == 0 {
            return Err(ValidationError::CapacityZero);
        }

        if self.producers == 0 {
            return Err(ValidationError::ProducersZero);
        }

        if self.consumers == 0 {
            return Err(ValidationError::ConsumersZero);
        }

        if self.drain_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "drain_timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        self.producer_backoff.validate("producer_backoff")?;
        self.consumer_work.validate("consumer_work")?;

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            producers: default_producers(),
            consumers: default_consumers(),
            items_per_producer: None,
            run_for_ms: None,
            drain_timeout_ms: default_drain_timeout_ms(),
            producer_backoff: BackoffConfig::default(),
            consumer_work: BackoffConfig::default(),
            payload_size: default_payload_size(),
        }
    }
}

fn default_capacity() -> usize {
    PipelineConfig::DEFAULT_CAPACITY
}

fn default_producers() -> usize {
    PipelineConfig::DEFAULT_PRODUCERS
}

fn default_consumers() -> usize {
    PipelineConfig::DEFAULT_CONSUMERS
}

fn default_drain_timeout_ms() -> u64 {
    PipelineConfig::DEFAULT_DRAIN_TIMEOUT_MS
}

fn default_payload_size() -> usize {
    PipelineConfig::DEFAULT_PAYLOAD_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();

        assert_eq!(config.capacity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(matches!(
            PipelineConfig::new(0, 1, 1).validate(),
            Err(ValidationError::CapacityZero)
        ));
        assert!(matches!(
            PipelineConfig::new(1, 0, 1).validate(),
            Err(ValidationError::ProducersZero)
        ));
        assert!(matches!(
            PipelineConfig::new(1, 1, 0).validate(),
            Err(ValidationError::ConsumersZero)
        ));
    }

    #[test]
    fn inverted_backoff_is_rejected() {
        let config = PipelineConfig {
            producer_backoff: BackoffConfig::new(10, 5),
            ..PipelineConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { field, .. }) if field == "producer_backoff.min_ms"
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"capacity": 2, "items_per_producer": 3}"#).unwrap();

        assert_eq!(config.capacity, 2);
        assert_eq!(config.items_per_producer, Some(3));
        assert_eq!(config.producers, PipelineConfig::DEFAULT_PRODUCERS);
        assert_eq!(config.drain_timeout(), Duration::from_secs(30));
    }
}
