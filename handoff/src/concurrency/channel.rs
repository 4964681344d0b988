//! Fixed-capacity FIFO handoff between producers and consumers.
//!
//! [`BoundedChannel`] keeps its buffer and counters behind a short-lived lock that is never held
//! across an await point, and uses [`Notify`] to park producers waiting for space and consumers
//! waiting for items. Every waiter registers interest before checking the state, so wakeups cannot
//! be lost between the check and the park.
//!
//! The same channel serves both scheduling models: async callers use [`BoundedChannel::put`] and
//! [`BoundedChannel::get`] on any tokio runtime flavor, OS-thread callers use the `blocking_*`
//! variants.

use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error};

use crate::bail;
use crate::error::{ErrorKind, HandoffResult};
use crate::metrics::{
    HANDOFF_CHANNEL_BUFFERED_ITEMS, HANDOFF_CHANNEL_IN_FLIGHT_ITEMS, HANDOFF_ITEMS_ABANDONED_TOTAL,
    HANDOFF_ITEMS_CONSUMED_TOTAL, HANDOFF_ITEMS_PRODUCED_TOTAL,
};
use crate::types::Item;

/// Point-in-time view of a channel's counters.
///
/// Like [`BoundedChannel::size`], a snapshot may be stale as soon as it is taken and is meant for
/// observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub capacity: usize,
    pub buffered: usize,
    pub in_flight: usize,
    pub enqueued: u64,
    pub acknowledged: u64,
    pub abandoned: u64,
    pub closed: bool,
}

/// How an in-flight item left the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Acknowledged,
    Abandoned,
}

#[derive(Debug)]
struct ChannelState<T> {
    buffer: VecDeque<Item<T>>,
    in_flight: usize,
    closed: bool,
    enqueued: u64,
    acknowledged: u64,
    abandoned: u64,
}

impl<T> ChannelState<T> {
    fn is_drained(&self) -> bool {
        self.buffer.is_empty() && self.in_flight == 0
    }
}

#[derive(Debug)]
struct ChannelInner<T> {
    capacity: usize,
    state: Mutex<ChannelState<T>>,
    item_available: Notify,
    space_available: Notify,
    drained: Notify,
}

/// Bounded multi-producer multi-consumer FIFO channel with acknowledgement tracking.
///
/// Handles are cheap to clone and all refer to the same buffer.
#[derive(Debug)]
pub struct BoundedChannel<T> {
    inner: Arc<ChannelInner<T>>,
}

impl<T> Clone for BoundedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> BoundedChannel<T> {
    /// Creates a new open channel holding at most `capacity` buffered items.
    pub fn new(capacity: usize) -> HandoffResult<Self> {
        if capacity == 0 {
            bail!(
                ErrorKind::InvalidCapacity,
                "Channel capacity must be at least one"
            );
        }

        Ok(Self {
            inner: Arc::new(ChannelInner {
                capacity,
                state: Mutex::new(ChannelState {
                    buffer: VecDeque::with_capacity(capacity),
                    in_flight: 0,
                    closed: false,
                    enqueued: 0,
                    acknowledged: 0,
                    abandoned: 0,
                }),
                item_available: Notify::new(),
                space_available: Notify::new(),
                drained: Notify::new(),
            }),
        })
    }

    /// Appends `payload` to the tail of the channel, waiting while the channel is full.
    ///
    /// Fails with [`ErrorKind::ChannelClosed`] if the channel is closed before the item could be
    /// buffered, in which case the payload is dropped. The method is cancel safe: if the returned
    /// future is dropped before completion the item was not enqueued.
    pub async fn put(&self, payload: T) -> HandoffResult<()> {
        loop {
            let notified = self.inner.space_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.state.lock();
                if state.closed {
                    bail!(
                        ErrorKind::ChannelClosed,
                        "Channel is closed",
                        "The item could not be put because the channel no longer accepts items"
                    );
                }

                if state.buffer.len() < self.inner.capacity {
                    state.buffer.push_back(Item::new(payload));
                    state.enqueued += 1;
                    let buffered = state.buffer.len();
                    drop(state);

                    gauge!(HANDOFF_CHANNEL_BUFFERED_ITEMS).set(buffered as f64);
                    counter!(HANDOFF_ITEMS_PRODUCED_TOTAL).increment(1);

                    self.inner.item_available.notify_one();

                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Removes the head item, waiting while the channel is empty.
    ///
    /// The returned [`Delivery`] keeps the item in flight until it is acknowledged or abandoned.
    /// Fails with [`ErrorKind::ChannelEof`] once the channel is closed and empty, which means there
    /// is no more work rather than a failure. The method is cancel safe: if the returned future is
    /// dropped, no item is removed.
    pub async fn get(&self) -> HandoffResult<Delivery<T>> {
        loop {
            let notified = self.inner.item_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.state.lock();
                if let Some(item) = state.buffer.pop_front() {
                    state.in_flight += 1;
                    let buffered = state.buffer.len();
                    let in_flight = state.in_flight;
                    drop(state);

                    gauge!(HANDOFF_CHANNEL_BUFFERED_ITEMS).set(buffered as f64);
                    gauge!(HANDOFF_CHANNEL_IN_FLIGHT_ITEMS).set(in_flight as f64);

                    self.inner.space_available.notify_one();

                    return Ok(Delivery::new(self.clone(), item));
                }

                if state.closed {
                    bail!(
                        ErrorKind::ChannelEof,
                        "Channel is closed and drained",
                        "No more items will be delivered by this channel"
                    );
                }
            }

            notified.await;
        }
    }

    /// Blocking version of [`BoundedChannel::put`] for callers running on plain OS threads.
    ///
    /// Must not be called from within an async execution context, since it parks the current
    /// thread until the item is buffered.
    pub fn blocking_put(&self, payload: T) -> HandoffResult<()> {
        futures::executor::block_on(self.put(payload))
    }

    /// Blocking version of [`BoundedChannel::get`] for callers running on plain OS threads.
    ///
    /// Must not be called from within an async execution context.
    pub fn blocking_get(&self) -> HandoffResult<Delivery<T>> {
        futures::executor::block_on(self.get())
    }

    /// Waits until every item ever enqueued was acknowledged or abandoned.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_drained() {
                return;
            }

            notified.await;
        }
    }

    /// Blocking version of [`BoundedChannel::wait_drained`].
    ///
    /// Must not be called from within an async execution context.
    pub fn blocking_wait_drained(&self) {
        futures::executor::block_on(self.wait_drained())
    }

    /// Closes the channel.
    ///
    /// Waiting producers fail with [`ErrorKind::ChannelClosed`]; consumers keep receiving the
    /// buffered items and then [`ErrorKind::ChannelEof`]. Returns `true` if this call closed the
    /// channel.
    pub fn close(&self) -> bool {
        let newly_closed = {
            let mut state = self.inner.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };

        if newly_closed {
            debug!("channel closed");

            self.inner.space_available.notify_waiters();
            self.inner.item_available.notify_waiters();
        }

        newly_closed
    }

    /// Closes the channel and discards every buffered item, counting them as abandoned.
    ///
    /// Used on teardown when no consumer is left to drain the buffer. Returns the number of
    /// discarded items.
    pub fn close_and_discard(&self) -> usize {
        self.close();

        let (discarded, drained) = {
            let mut state = self.inner.state.lock();
            let discarded = state.buffer.len();
            state.buffer.clear();
            state.abandoned += discarded as u64;
            (discarded, state.is_drained())
        };

        if discarded > 0 {
            error!(discarded, "discarded buffered items that were never delivered");

            gauge!(HANDOFF_CHANNEL_BUFFERED_ITEMS).set(0.0);
            counter!(HANDOFF_ITEMS_ABANDONED_TOTAL).increment(discarded as u64);
        }

        if drained {
            self.inner.drained.notify_waiters();
        }

        discarded
    }

    /// Returns the number of buffered items.
    ///
    /// The value is advisory and may be stale as soon as it is read. It must not drive any
    /// correctness decision.
    pub fn size(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    /// Returns the number of items delivered but not yet acknowledged or abandoned.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Returns the maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Returns `true` once the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Returns `true` when nothing is buffered and nothing is in flight.
    pub fn is_drained(&self) -> bool {
        self.inner.state.lock().is_drained()
    }

    /// Returns a snapshot of the channel counters.
    pub fn stats(&self) -> ChannelStats {
        let state = self.inner.state.lock();

        ChannelStats {
            capacity: self.inner.capacity,
            buffered: state.buffer.len(),
            in_flight: state.in_flight,
            enqueued: state.enqueued,
            acknowledged: state.acknowledged,
            abandoned: state.abandoned,
            closed: state.closed,
        }
    }

    /// Moves one in-flight item to its final state and wakes drain waiters if needed.
    fn settle(&self, settlement: Settlement) {
        let (in_flight, drained) = {
            let mut state = self.inner.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            match settlement {
                Settlement::Acknowledged => state.acknowledged += 1,
                Settlement::Abandoned => state.abandoned += 1,
            }

            (state.in_flight, state.is_drained())
        };

        gauge!(HANDOFF_CHANNEL_IN_FLIGHT_ITEMS).set(in_flight as f64);
        match settlement {
            Settlement::Acknowledged => counter!(HANDOFF_ITEMS_CONSUMED_TOTAL).increment(1),
            Settlement::Abandoned => counter!(HANDOFF_ITEMS_ABANDONED_TOTAL).increment(1),
        }

        if drained {
            self.inner.drained.notify_waiters();
        }
    }
}

/// An item taken out of a [`BoundedChannel`] that is still in flight.
///
/// Call [`Delivery::ack`] once the item is fully processed or [`Delivery::abandon`] to report
/// that it will never be. A delivery dropped without either, for example because the consumer
/// panicked or was aborted, is counted as abandoned so that drain detection never waits for it.
#[derive(Debug)]
#[must_use = "a delivery must be acknowledged or abandoned"]
pub struct Delivery<T> {
    channel: BoundedChannel<T>,
    item: Item<T>,
    settled: bool,
}

impl<T> Delivery<T> {
    fn new(channel: BoundedChannel<T>, item: Item<T>) -> Self {
        Self {
            channel,
            item,
            settled: false,
        }
    }

    /// Returns the delivered item.
    pub fn item(&self) -> &Item<T> {
        &self.item
    }

    /// Returns the delivered payload.
    pub fn payload(&self) -> &T {
        self.item.payload()
    }

    /// Acknowledges the item as fully processed.
    pub fn ack(mut self) {
        self.settled = true;
        self.channel.settle(Settlement::Acknowledged);
    }

    /// Reports the item as abandoned, it will never be acknowledged.
    pub fn abandon(mut self) {
        self.settled = true;
        self.channel.settle(Settlement::Abandoned);
    }
}

impl<T> Drop for Delivery<T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        error!(
            age_ms = self.item.age().as_millis() as u64,
            "delivery dropped without acknowledgement, the item is reported as abandoned"
        );

        self.channel.settle(Settlement::Abandoned);
    }
}
