//! Shared integer guarded by a lock.
//!
//! [`GuardedCounter`] only exposes complete read-modify-write sequences, each performed while the
//! lock is held. The lock is a synchronous [`parking_lot`] lock and the critical section never
//! suspends, so the same counter is exact under a cooperative single-threaded runtime, a
//! preemptive multi-threaded runtime, and plain OS threads.
//!
//! # Lock strategies
//!
//! With [`LockStrategy::Plain`] the lock is not reentrant: calling [`GuardedCounter::increment`]
//! or [`GuardedCounter::lock`] from inside [`GuardedCounter::with_lock`] on the same thread
//! deadlocks. [`LockStrategy::Reentrant`] lets the holding thread acquire the lock again, which
//! makes nested critical sections safe at the cost of a slightly more expensive acquisition.

use handoff_config::shared::LockStrategy;
use metrics::counter;
use parking_lot::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};
use serde::Serialize;
use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::{HandoffError, HandoffResult};
use crate::metrics::{HANDOFF_COUNTER_INCREMENTS_TOTAL, LOCK_STRATEGY_LABEL};
use crate::types::serialize_millis;

#[derive(Debug)]
enum CounterLock {
    Plain(Mutex<i64>),
    Reentrant(ReentrantMutex<Cell<i64>>),
}

/// Exclusive access to the value of a [`GuardedCounter`].
///
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub enum CounterGuard<'a> {
    Plain(MutexGuard<'a, i64>),
    Reentrant(ReentrantMutexGuard<'a, Cell<i64>>),
}

impl CounterGuard<'_> {
    /// Returns the current value.
    pub fn get(&self) -> i64 {
        match self {
            CounterGuard::Plain(guard) => **guard,
            CounterGuard::Reentrant(guard) => guard.get(),
        }
    }

    /// Overwrites the current value.
    pub fn set(&mut self, value: i64) {
        match self {
            CounterGuard::Plain(guard) => **guard = value,
            CounterGuard::Reentrant(guard) => guard.set(value),
        }
    }
}

/// Integer whose updates are serialized by a lock.
#[derive(Debug)]
pub struct GuardedCounter {
    lock: CounterLock,
    strategy: LockStrategy,
    critical_section_delay: Option<Duration>,
}

impl GuardedCounter {
    /// Creates a counter starting at zero.
    pub fn new(strategy: LockStrategy) -> Self {
        Self::with_initial(strategy, 0)
    }

    /// Creates a counter starting at `initial`.
    pub fn with_initial(strategy: LockStrategy, initial: i64) -> Self {
        let lock = match strategy {
            LockStrategy::Plain => CounterLock::Plain(Mutex::new(initial)),
            LockStrategy::Reentrant => CounterLock::Reentrant(ReentrantMutex::new(Cell::new(initial))),
        };

        Self {
            lock,
            strategy,
            critical_section_delay: None,
        }
    }

    /// Sleeps for `delay` between the read and the write of every increment.
    ///
    /// The sleep blocks the calling thread while the lock is held. It widens the window in which
    /// an unguarded counter would lose updates and has no effect on the result here.
    pub fn with_critical_section_delay(mut self, delay: Duration) -> Self {
        self.critical_section_delay = Some(delay);
        self
    }

    /// Returns the lock strategy of this counter.
    pub fn strategy(&self) -> LockStrategy {
        self.strategy
    }

    /// Acquires the lock, blocking the current thread until it is available.
    pub fn lock(&self) -> CounterGuard<'_> {
        match &self.lock {
            CounterLock::Plain(mutex) => CounterGuard::Plain(mutex.lock()),
            CounterLock::Reentrant(mutex) => CounterGuard::Reentrant(mutex.lock()),
        }
    }

    /// Runs `f` while holding the lock.
    ///
    /// With [`LockStrategy::Reentrant`], `f` may call back into this counter. With
    /// [`LockStrategy::Plain`] doing so deadlocks the calling thread.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut CounterGuard<'_>) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Adds one to the counter and returns the new value.
    pub fn increment(&self) -> i64 {
        let value = self.with_lock(|guard| {
            let current = guard.get();
            if let Some(delay) = self.critical_section_delay {
                std::thread::sleep(delay);
            }

            let next = current + 1;
            guard.set(next);
            next
        });

        counter!(HANDOFF_COUNTER_INCREMENTS_TOTAL, LOCK_STRATEGY_LABEL => self.strategy.as_str())
            .increment(1);

        value
    }

    /// Returns the current value.
    pub fn value(&self) -> i64 {
        self.lock().get()
    }
}

/// Outcome of [`increment_concurrently`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterReport {
    pub lock_strategy: LockStrategy,
    pub workers: usize,
    pub increments_per_worker: u64,
    pub start_value: i64,
    pub end_value: i64,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl CounterReport {
    /// Returns the value the counter should hold if no update was lost.
    pub fn expected_value(&self) -> i64 {
        self.start_value + (self.workers as u64 * self.increments_per_worker) as i64
    }

    /// Returns `true` when every increment is reflected in the final value.
    pub fn is_exact(&self) -> bool {
        self.end_value == self.expected_value()
    }
}

/// Spawns `workers` tasks on the current runtime, each incrementing `counter`
/// `increments_per_worker` times and yielding to the scheduler between increments.
pub async fn increment_concurrently(
    counter: &Arc<GuardedCounter>,
    workers: usize,
    increments_per_worker: u64,
) -> HandoffResult<CounterReport> {
    let start_value = counter.value();
    let started = Instant::now();

    info!(
        workers,
        increments_per_worker,
        lock_strategy = %counter.strategy(),
        start_value,
        "starting concurrent increments"
    );

    let mut tasks = JoinSet::new();
    for worker in 0..workers {
        let counter = counter.clone();
        tasks.spawn(async move {
            for _ in 0..increments_per_worker {
                counter.increment();
                tokio::task::yield_now().await;
            }

            debug!(worker, "counter worker finished");
        });
    }

    let mut errors: Vec<HandoffError> = Vec::new();
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            errors.push(err.into());
        }
    }

    if !errors.is_empty() {
        return Err(errors.into());
    }

    let report = CounterReport {
        lock_strategy: counter.strategy(),
        workers,
        increments_per_worker,
        start_value,
        end_value: counter.value(),
        elapsed: started.elapsed(),
    };

    info!(
        end_value = report.end_value,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "concurrent increments finished"
    );

    Ok(report)
}
