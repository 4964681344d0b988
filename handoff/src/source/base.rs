use std::future::Future;

use crate::error::HandoffResult;
use crate::types::WorkerId;

/// Trait for generators of pipeline payloads.
///
/// A single source value is cloned into every producer, so implementations that keep state must
/// share it internally and be safe under concurrent calls.
pub trait ItemSource {
    /// Type of the payloads produced by this source.
    type Payload: Send + Sync + 'static;

    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Generates the next payload for `producer`.
    ///
    /// `sequence` counts the payloads this producer already enqueued. Returning `Ok(None)` tells
    /// the producer that the source is exhausted, and it stops without error.
    fn next_item(
        &self,
        producer: WorkerId,
        sequence: u64,
    ) -> impl Future<Output = HandoffResult<Option<Self::Payload>>> + Send;
}

/// Number of items each producer generates before stopping on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionQuota {
    /// Each producer stops after this many items.
    PerProducer(u64),
    /// Producers run until shutdown or until the source is exhausted.
    Unbounded,
}

impl ProductionQuota {
    /// Returns `true` once `produced` items satisfy the quota.
    pub fn is_reached(&self, produced: u64) -> bool {
        match self {
            ProductionQuota::PerProducer(limit) => produced >= *limit,
            ProductionQuota::Unbounded => false,
        }
    }
}

impl From<Option<u64>> for ProductionQuota {
    fn from(items_per_producer: Option<u64>) -> Self {
        match items_per_producer {
            Some(limit) => ProductionQuota::PerProducer(limit),
            None => ProductionQuota::Unbounded,
        }
    }
}
