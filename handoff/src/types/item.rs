use std::time::{Duration, Instant};

/// A payload travelling through a [`crate::concurrency::channel::BoundedChannel`].
///
/// The enqueue timestamp is taken when the item is created by the channel on `put`, so the
/// queueing latency observed by consumers only covers time spent buffered or in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<T> {
    payload: T,
    enqueued_at: Instant,
}

impl<T> Item<T> {
    /// Wraps `payload` stamping it with the current time.
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            enqueued_at: Instant::now(),
        }
    }

    /// Returns a reference to the payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Returns the instant at which the item entered the channel.
    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Returns how long ago the item entered the channel.
    pub fn age(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}
