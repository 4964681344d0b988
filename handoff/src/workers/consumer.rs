use metrics::histogram;
use tracing::{Instrument, debug, info};

use crate::concurrency::channel::BoundedChannel;
use crate::error::HandoffResult;
#[cfg(feature = "failpoints")]
use crate::failpoints::{CONSUMER_BEFORE_ACK, handoff_fail_point};
use crate::metrics::HANDOFF_ITEM_LATENCY_SECONDS;
use crate::processor::ItemProcessor;
use crate::types::WorkerId;
use crate::workers::pool::WorkerPool;

/// Worker getting items from the channel, processing and acknowledging them.
///
/// Consumers do not watch the shutdown signal. They keep draining until the channel is closed and
/// empty, which is how the pipeline tells them to stop. A processing error abandons the current
/// item and terminates the consumer.
#[derive(Debug)]
pub struct Consumer<T, P> {
    id: WorkerId,
    channel: BoundedChannel<T>,
    processor: P,
}

impl<T, P> Consumer<T, P>
where
    T: Send + Sync + 'static,
    P: ItemProcessor<T> + Send + Sync + 'static,
{
    pub fn new(id: WorkerId, channel: BoundedChannel<T>, processor: P) -> Self {
        Self {
            id,
            channel,
            processor,
        }
    }

    /// Spawns the consumer into `pool`.
    pub fn spawn_into(self, pool: &mut WorkerPool) {
        let id = self.id;
        let span = tracing::info_span!("consumer", worker = %id);
        pool.spawn(id, self.run().instrument(span));
    }

    /// Runs the consumption loop and returns the number of acknowledged items.
    pub async fn run(self) -> HandoffResult<u64> {
        let mut consumed = 0;

        loop {
            let delivery = match self.channel.get().await {
                Ok(delivery) => delivery,
                Err(err) if err.kind().is_end_of_stream() => {
                    info!(consumed, "channel drained, consumer stopping");
                    break;
                }
                Err(err) => return Err(err),
            };

            if let Err(err) = self.processor.process(self.id, delivery.item()).await {
                delivery.abandon();
                return Err(err);
            }

            #[cfg(feature = "failpoints")]
            handoff_fail_point(CONSUMER_BEFORE_ACK)?;

            histogram!(HANDOFF_ITEM_LATENCY_SECONDS).record(delivery.item().age().as_secs_f64());

            delivery.ack();
            consumed += 1;

            debug!(consumed, "item consumed");
        }

        Ok(consumed)
    }
}
