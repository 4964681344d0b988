use std::future::Future;

use crate::error::HandoffResult;
use crate::types::{Item, WorkerId};

/// Trait for the work consumers perform on each delivered item.
///
/// The consumer acknowledges the item once [`ItemProcessor::process`] returns `Ok`. On error the
/// item is reported as abandoned and the consumer terminates, since no retries are attempted.
///
/// A single processor value is cloned into every consumer, so calls may run concurrently.
pub trait ItemProcessor<P> {
    /// Returns the name of the processor.
    fn name() -> &'static str;

    /// Processes one item on behalf of `consumer`.
    fn process(
        &self,
        consumer: WorkerId,
        item: &Item<P>,
    ) -> impl Future<Output = HandoffResult<()>> + Send;
}
