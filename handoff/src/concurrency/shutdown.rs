//! One-way shutdown signal shared by every worker of a pipeline.
//!
//! The signal is a watch channel over a `bool` that only ever goes from `false` to `true`.
//! Workers check it without blocking through [`is_shutdown_requested`] and await it inside
//! `tokio::select!` through [`wait_for_shutdown`].

use tokio::sync::watch;

/// Receiver side of the shutdown signal.
pub type ShutdownRx = watch::Receiver<bool>;

/// Transmitter side of the shutdown signal.
///
/// Raising the signal is idempotent: only the first call flips the flag and wakes receivers,
/// later calls are no-ops.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Wraps a watch sender into a [`ShutdownTx`].
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Raises the shutdown signal.
    ///
    /// Returns `true` if this call raised the signal, `false` if it was already raised.
    pub fn shutdown(&self) -> bool {
        // Uses `send_if_modified` so that the flag is written once and works without receivers.
        self.0.send_if_modified(|raised| {
            if *raised {
                return false;
            }

            *raised = true;
            true
        })
    }

    /// Returns `true` once the shutdown signal has been raised.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Creates a new shutdown receiver subscription.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a new shutdown channel in the lowered state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx::new(tx), rx)
}

/// Returns `true` if shutdown was requested, without waiting.
pub fn is_shutdown_requested(shutdown_rx: &ShutdownRx) -> bool {
    *shutdown_rx.borrow()
}

/// Waits until the shutdown signal is raised.
///
/// A dropped transmitter is treated as a raised signal, since nobody is left to lower it.
pub async fn wait_for_shutdown(shutdown_rx: &mut ShutdownRx) {
    let _ = shutdown_rx.wait_for(|raised| *raised).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn shutdown_is_raised_once() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        assert!(!is_shutdown_requested(&shutdown_rx));
        assert!(shutdown_tx.shutdown());
        assert!(!shutdown_tx.shutdown());
        assert!(!shutdown_tx.shutdown());

        assert!(shutdown_tx.is_shutdown());
        assert!(is_shutdown_requested(&shutdown_rx));
    }

    #[test]
    fn shutdown_works_without_receivers() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        drop(shutdown_rx);

        assert!(shutdown_tx.shutdown());
        assert!(is_shutdown_requested(&shutdown_tx.subscribe()));
    }

    #[tokio::test]
    async fn waiters_are_woken_by_shutdown() {
        let (shutdown_tx, mut shutdown_rx) = create_shutdown_channel();

        let waiter = tokio::spawn(async move {
            wait_for_shutdown(&mut shutdown_rx).await;
        });

        tokio::task::yield_now().await;
        shutdown_tx.shutdown();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should observe shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_transmitter_counts_as_shutdown() {
        let (shutdown_tx, mut shutdown_rx) = create_shutdown_channel();
        drop(shutdown_tx);

        tokio::time::timeout(Duration::from_secs(5), wait_for_shutdown(&mut shutdown_rx))
            .await
            .expect("closed signal should not block");
    }
}
