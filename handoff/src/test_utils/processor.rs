use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

use crate::bail;
use crate::error::{ErrorKind, HandoffResult};
use crate::processor::ItemProcessor;
use crate::test_utils::notify::within;
use crate::types::{Item, WorkerId};

#[derive(Debug)]
struct Inner<T> {
    consumed: Mutex<Vec<(WorkerId, T)>>,
    item_consumed: Notify,
}

/// Processor recording every payload it processes, in processing order.
#[derive(Debug, Clone)]
pub struct MemoryProcessor<T> {
    inner: Arc<Inner<T>>,
    work: Option<Duration>,
}

impl<T> MemoryProcessor<T>
where
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                consumed: Mutex::new(Vec::new()),
                item_consumed: Notify::new(),
            }),
            work: None,
        }
    }

    /// Sleeps for `work` before recording each item.
    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = Some(work);
        self
    }

    /// Returns every processed payload in processing order.
    pub fn payloads(&self) -> Vec<T> {
        self.inner
            .consumed
            .lock()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Returns processed payloads grouped by consumer, each group in processing order.
    pub fn payloads_by_consumer(&self) -> HashMap<WorkerId, Vec<T>> {
        let mut grouped: HashMap<WorkerId, Vec<T>> = HashMap::new();
        for (consumer, payload) in self.inner.consumed.lock().iter() {
            grouped.entry(*consumer).or_default().push(payload.clone());
        }

        grouped
    }

    /// Returns the number of processed payloads.
    pub fn count(&self) -> usize {
        self.inner.consumed.lock().len()
    }

    /// Waits until at least `count` payloads were processed.
    ///
    /// # Panics
    ///
    /// Panics if the count is not reached within the default test timeout.
    pub async fn wait_for_count(&self, count: usize) {
        within("processed items", async {
            loop {
                let notified = self.inner.item_consumed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.count() >= count {
                    return;
                }

                notified.await;
            }
        })
        .await
    }

    fn record(&self, consumer: WorkerId, payload: T) {
        self.inner.consumed.lock().push((consumer, payload));
        self.inner.item_consumed.notify_waiters();
    }
}

impl<T> Default for MemoryProcessor<T>
where
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ItemProcessor<T> for MemoryProcessor<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name() -> &'static str {
        "memory"
    }

    async fn process(&self, consumer: WorkerId, item: &Item<T>) -> HandoffResult<()> {
        if let Some(work) = self.work {
            tokio::time::sleep(work).await;
        }

        self.record(consumer, item.payload().clone());

        Ok(())
    }
}

/// Fault triggered by [`FaultInjectingProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fails processing with [`ErrorKind::ProcessingFailed`].
    Error,
    /// Panics inside the consumer.
    Panic,
    /// Never finishes processing.
    Hang,
    /// Blocks the worker thread for the given time without yielding, then fails like
    /// [`Fault::Error`]. An abort requested meanwhile cannot take effect before the failure.
    Stall(Duration),
}

/// Processor that behaves like [`MemoryProcessor`] except on the `n`-th item it receives,
/// counting from one across all consumers, where it triggers a [`Fault`].
#[derive(Debug, Clone)]
pub struct FaultInjectingProcessor<T> {
    inner: MemoryProcessor<T>,
    fault: Fault,
    trigger_at: u64,
    received: Arc<AtomicU64>,
}

impl<T> FaultInjectingProcessor<T>
where
    T: Clone,
{
    pub fn new(fault: Fault, trigger_at: u64) -> Self {
        Self::wrap(MemoryProcessor::new(), fault, trigger_at)
    }

    pub fn wrap(inner: MemoryProcessor<T>, fault: Fault, trigger_at: u64) -> Self {
        Self {
            inner,
            fault,
            trigger_at,
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the processor recording successfully processed items.
    pub fn recorded(&self) -> &MemoryProcessor<T> {
        &self.inner
    }
}

impl<T> ItemProcessor<T> for FaultInjectingProcessor<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name() -> &'static str {
        "fault_injecting"
    }

    async fn process(&self, consumer: WorkerId, item: &Item<T>) -> HandoffResult<()> {
        let received = self.received.fetch_add(1, Ordering::SeqCst) + 1;
        if received == self.trigger_at {
            match self.fault {
                Fault::Error => bail!(
                    ErrorKind::ProcessingFailed,
                    "Injected processing failure",
                    format!("{consumer} failed on item {received}")
                ),
                Fault::Panic => panic!("{consumer} panicked on item {received}"),
                Fault::Hang => futures::future::pending::<()>().await,
                Fault::Stall(duration) => {
                    std::thread::sleep(duration);
                    bail!(
                        ErrorKind::ProcessingFailed,
                        "Injected processing failure",
                        format!("{consumer} failed on item {received} after stalling")
                    )
                }
            }
        }

        self.inner.process(consumer, item).await
    }
}
