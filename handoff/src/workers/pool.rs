use futures::FutureExt;
use metrics::counter;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::{self, JoinSet};
use tracing::{debug, error};

use crate::error::{ErrorKind, HandoffError, HandoffResult};
use crate::handoff_error;
use crate::metrics::{HANDOFF_WORKER_FAILURES_TOTAL, WORKER_KIND_LABEL};
use crate::types::{WorkerId, WorkerKind};

/// Final state of a worker collected by [`WorkerPool::join_next`].
#[derive(Debug)]
pub struct WorkerExit {
    /// Identity of the worker.
    pub id: WorkerId,
    /// Number of items the worker handled, or the reason it terminated abnormally.
    pub result: HandoffResult<u64>,
    /// Whether the worker was aborted through [`WorkerPool::abort_all`] before it finished.
    pub cancelled: bool,
}

/// Set of spawned workers of one kind.
///
/// Failures are isolated: a worker returning an error or panicking only ends that worker, and
/// the failure is reported with the worker identity when it is joined. Panics are caught inside
/// the task so the pool still knows which worker crashed.
#[derive(Debug)]
pub struct WorkerPool {
    kind: WorkerKind,
    join_set: JoinSet<(WorkerId, HandoffResult<u64>)>,
    /// Identity of each running task, used to attribute cancellations.
    ids: HashMap<task::Id, WorkerId>,
}

impl WorkerPool {
    /// Creates an empty pool for workers of `kind`.
    pub fn new(kind: WorkerKind) -> Self {
        Self {
            kind,
            join_set: JoinSet::new(),
            ids: HashMap::new(),
        }
    }

    /// Spawns `future` as the worker `id` on the current runtime.
    pub fn spawn<F>(&mut self, id: WorkerId, future: F)
    where
        F: Future<Output = HandoffResult<u64>> + Send + 'static,
    {
        let abort_handle = self.join_set.spawn(async move {
            let result = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(panic_error(id, panic)),
            };

            (id, result)
        });

        self.ids.insert(abort_handle.id(), id);

        debug!(worker = %id, "spawned worker");
    }

    /// Returns the number of workers that were not joined yet.
    pub fn len(&self) -> usize {
        self.join_set.len()
    }

    /// Returns `true` when every worker was joined.
    pub fn is_empty(&self) -> bool {
        self.join_set.is_empty()
    }

    /// Waits for the next worker to terminate.
    ///
    /// Returns `None` once the pool is empty. The method is cancel safe.
    pub async fn join_next(&mut self) -> Option<WorkerExit> {
        let joined = self.join_set.join_next_with_id().await?;

        let exit = match joined {
            Ok((task_id, (id, result))) => {
                self.ids.remove(&task_id);
                WorkerExit {
                    id,
                    result,
                    cancelled: false,
                }
            }
            Err(err) => {
                let id = self
                    .ids
                    .remove(&err.id())
                    .unwrap_or(WorkerId { kind: self.kind, index: usize::MAX });
                let cancelled = err.is_cancelled();
                let description = if cancelled {
                    "Worker was aborted"
                } else {
                    "Worker task failed"
                };

                WorkerExit {
                    id,
                    result: Err(handoff_error!(
                        failure_kind(self.kind),
                        description,
                        format!("{id}: {err}")
                    )),
                    cancelled,
                }
            }
        };

        if let Err(err) = &exit.result {
            counter!(HANDOFF_WORKER_FAILURES_TOTAL, WORKER_KIND_LABEL => self.kind.as_str())
                .increment(1);

            error!(worker = %exit.id, error = %err, "worker terminated abnormally");
        }

        Some(exit)
    }

    /// Aborts every worker still running.
    ///
    /// Aborted workers are still returned by [`WorkerPool::join_next`], with an error.
    pub fn abort_all(&mut self) {
        debug!(kind = %self.kind, remaining = self.len(), "aborting workers");

        self.join_set.abort_all();
    }
}

/// Returns the error kind reported for an abnormal termination of a worker of `kind`.
pub fn failure_kind(kind: WorkerKind) -> ErrorKind {
    match kind {
        WorkerKind::Producer => ErrorKind::ProducerFailed,
        WorkerKind::Consumer => ErrorKind::ConsumerFailed,
    }
}

fn panic_error(id: WorkerId, panic: Box<dyn Any + Send>) -> HandoffError {
    let message = if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };

    let (kind, description) = match id.kind {
        WorkerKind::Producer => (ErrorKind::ProducerPanic, "Producer panicked"),
        WorkerKind::Consumer => (ErrorKind::ConsumerPanic, "Consumer panicked"),
    };

    handoff_error!(kind, description, format!("{id}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn failing_source() -> HandoffResult<u64> {
        Err(handoff_error!(ErrorKind::SourceFailed, "Source failed"))
    }

    async fn exploding_consumer() -> HandoffResult<u64> {
        panic!("boom")
    }

    #[tokio::test]
    async fn exits_carry_worker_identity() {
        let mut pool = WorkerPool::new(WorkerKind::Producer);
        pool.spawn(WorkerId::producer(0), async { Ok(3) });
        pool.spawn(WorkerId::producer(1), failing_source());

        let mut exits = Vec::new();
        while let Some(exit) = pool.join_next().await {
            exits.push(exit);
        }
        exits.sort_by_key(|exit| exit.id.index);

        assert!(pool.is_empty());
        assert!(exits.iter().all(|exit| !exit.cancelled));
        assert_eq!(exits[0].result.as_ref().unwrap(), &3);
        assert_eq!(exits[1].id, WorkerId::producer(1));
        assert_eq!(
            exits[1].result.as_ref().unwrap_err().kind(),
            ErrorKind::SourceFailed
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn panics_are_isolated_and_reported() {
        let mut pool = WorkerPool::new(WorkerKind::Consumer);
        pool.spawn(WorkerId::consumer(2), exploding_consumer());
        pool.spawn(WorkerId::consumer(3), async { Ok(1) });

        let mut panicked = None;
        let mut succeeded = 0;
        while let Some(exit) = pool.join_next().await {
            match exit.result {
                Ok(_) => succeeded += 1,
                Err(err) => panicked = Some((exit.id, err)),
            }
        }

        let (id, err) = panicked.unwrap();
        assert_eq!(id, WorkerId::consumer(2));
        assert_eq!(err.kind(), ErrorKind::ConsumerPanic);
        assert_eq!(err.detail(), Some("consumer-2: boom"));
        assert_eq!(succeeded, 1);
    }

    #[tokio::test]
    async fn aborted_workers_are_reported() {
        let mut pool = WorkerPool::new(WorkerKind::Consumer);
        pool.spawn(WorkerId::consumer(0), async {
            futures::future::pending::<()>().await;
            Ok(0)
        });

        pool.abort_all();
        let exit = pool.join_next().await.unwrap();

        assert_eq!(exit.id, WorkerId::consumer(0));
        assert!(exit.cancelled);
        assert_eq!(exit.result.unwrap_err().kind(), ErrorKind::ConsumerFailed);
        assert!(pool.join_next().await.is_none());
    }
}
