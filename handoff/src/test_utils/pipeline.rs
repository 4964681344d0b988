use handoff_config::shared::{BackoffConfig, PipelineConfig};
use std::time::Duration;

use crate::pipeline::Pipeline;
use crate::processor::ItemProcessor;
use crate::source::ItemSource;

/// Builder for pipelines used in tests.
///
/// Defaults to a capacity of 2 with one producer and one consumer, no backoff, and a drain
/// timeout of 10 seconds so a stuck drain fails the test instead of hanging it.
///
/// ```ignore
/// let pipeline = PipelineBuilder::new()
///     .with_capacity(4)
///     .with_workers(2, 3)
///     .build(SequenceSource, MemoryProcessor::new());
/// ```
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig {
                drain_timeout_ms: 10_000,
                ..PipelineConfig::new(2, 1, 1)
            },
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn with_workers(mut self, producers: usize, consumers: usize) -> Self {
        self.config.producers = producers;
        self.config.consumers = consumers;
        self
    }

    pub fn with_run_for(mut self, run_for: Duration) -> Self {
        self.config.run_for_ms = Some(run_for.as_millis() as u64);
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.config.drain_timeout_ms = drain_timeout.as_millis() as u64;
        self
    }

    pub fn with_producer_backoff(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.config.producer_backoff = BackoffConfig::new(min_ms, max_ms);
        self
    }

    /// Returns the configuration built so far.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Builds the pipeline.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn build<S, P>(self, source: S, processor: P) -> Pipeline<S, P>
    where
        S: ItemSource + Clone + Send + Sync + 'static,
        P: ItemProcessor<S::Payload> + Clone + Send + Sync + 'static,
    {
        Pipeline::new(self.config, source, processor).expect("test pipeline config must be valid")
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
