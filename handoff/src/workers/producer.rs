use handoff_config::shared::BackoffConfig;
use tracing::{Instrument, debug, info};

use crate::concurrency::channel::BoundedChannel;
use crate::concurrency::shutdown::{ShutdownRx, is_shutdown_requested, wait_for_shutdown};
use crate::concurrency::timer::random_delay;
use crate::error::{ErrorKind, HandoffResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{PRODUCER_BEFORE_PUT, handoff_fail_point};
use crate::source::{ItemSource, ProductionQuota};
use crate::types::WorkerId;
use crate::workers::pool::WorkerPool;

/// Worker generating items from an [`ItemSource`] and putting them into the channel.
///
/// A producer stops without error when its quota is reached, when the source is exhausted, when
/// shutdown is requested, or when the channel is closed under it. Shutdown is observed while
/// backing off and while blocked on a full channel, so a raised signal stops it promptly.
#[derive(Debug)]
pub struct Producer<S>
where
    S: ItemSource,
{
    id: WorkerId,
    source: S,
    channel: BoundedChannel<S::Payload>,
    quota: ProductionQuota,
    backoff: BackoffConfig,
    shutdown_rx: ShutdownRx,
}

impl<S> Producer<S>
where
    S: ItemSource + Send + Sync + 'static,
{
    pub fn new(
        id: WorkerId,
        source: S,
        channel: BoundedChannel<S::Payload>,
        quota: ProductionQuota,
        backoff: BackoffConfig,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            id,
            source,
            channel,
            quota,
            backoff,
            shutdown_rx,
        }
    }

    /// Spawns the producer into `pool`.
    pub fn spawn_into(self, pool: &mut WorkerPool) {
        let id = self.id;
        let span = tracing::info_span!("producer", worker = %id);
        pool.spawn(id, self.run().instrument(span));
    }

    /// Runs the production loop and returns the number of items put into the channel.
    pub async fn run(mut self) -> HandoffResult<u64> {
        let mut produced = 0;

        loop {
            if is_shutdown_requested(&self.shutdown_rx) {
                info!(produced, "shutdown requested, producer stopping");
                break;
            }

            if self.quota.is_reached(produced) {
                info!(produced, "quota reached, producer stopping");
                break;
            }

            if let Some(delay) = random_delay(&self.backoff) {
                tokio::select! {
                    biased;

                    _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                        info!(produced, "shutdown requested while backing off, producer stopping");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let Some(payload) = self.source.next_item(self.id, produced).await? else {
                info!(produced, source = S::name(), "source exhausted, producer stopping");
                break;
            };

            #[cfg(feature = "failpoints")]
            handoff_fail_point(PRODUCER_BEFORE_PUT)?;

            tokio::select! {
                biased;

                // The payload is dropped without being enqueued, nothing leaks from the channel.
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!(produced, "shutdown requested while blocked on put, producer stopping");
                    break;
                }
                result = self.channel.put(payload) => match result {
                    Ok(()) => {
                        produced += 1;
                        debug!(sequence = produced, "item produced");
                    }
                    Err(err) if err.kind() == ErrorKind::ChannelClosed => {
                        info!(produced, "channel closed, producer stopping");
                        break;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        Ok(produced)
    }
}
