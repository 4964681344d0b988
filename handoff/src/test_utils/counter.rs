use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Counter updated with a separate load and store and no lock.
///
/// Concurrent increments overlap and lose updates. It exists only to show the difference with
/// [`crate::concurrency::counter::GuardedCounter`].
#[derive(Debug, Default)]
pub struct UnguardedCounter {
    value: AtomicI64,
    delay: Option<Duration>,
}

impl UnguardedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses for `delay` between the load and the store of each increment.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            value: AtomicI64::new(0),
            delay: Some(delay),
        }
    }

    /// Increments the counter, yielding to the scheduler between the load and the store.
    pub async fn increment(&self) -> i64 {
        let current = self.value.load(Ordering::SeqCst);
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let next = current + 1;
        self.value.store(next, Ordering::SeqCst);
        next
    }

    /// Increments the counter from a plain thread, sleeping between the load and the store.
    pub fn blocking_increment(&self) -> i64 {
        let current = self.value.load(Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let next = current + 1;
        self.value.store(next, Ordering::SeqCst);
        next
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }
}
