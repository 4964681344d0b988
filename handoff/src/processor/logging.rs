use handoff_config::shared::BackoffConfig;
use std::fmt;
use tracing::info;

use crate::concurrency::timer::random_delay;
use crate::error::HandoffResult;
use crate::processor::ItemProcessor;
use crate::types::{Item, WorkerId};

/// Processor that logs each payload with its queueing latency and simulates work by sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProcessor {
    work: BackoffConfig,
}

impl LoggingProcessor {
    /// Creates a processor sleeping for a random duration drawn from `work` per item.
    pub fn new(work: BackoffConfig) -> Self {
        Self { work }
    }
}

impl<P> ItemProcessor<P> for LoggingProcessor
where
    P: fmt::Debug + Sync,
{
    fn name() -> &'static str {
        "logging"
    }

    async fn process(&self, consumer: WorkerId, item: &Item<P>) -> HandoffResult<()> {
        info!(
            %consumer,
            payload = ?item.payload(),
            latency_ms = item.age().as_millis() as u64,
            "consumed item"
        );

        if let Some(delay) = random_delay(&self.work) {
            tokio::time::sleep(delay).await;
        }

        Ok(())
    }
}
