use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Default time a test waits for a pipeline or worker before failing.
///
/// Every operation awaited in tests completes in milliseconds, a test reaching this limit is stuck.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Awaits `future` for at most [`DEFAULT_TEST_TIMEOUT`].
///
/// # Panics
///
/// Panics with `what` in the message if the timeout elapses first.
pub async fn within<F>(what: &str, future: F) -> F::Output
where
    F: Future,
{
    within_timeout(what, DEFAULT_TEST_TIMEOUT, future).await
}

/// Awaits `future` for at most `duration`.
///
/// # Panics
///
/// Panics with `what` in the message if the timeout elapses first.
pub async fn within_timeout<F>(what: &str, duration: Duration, future: F) -> F::Output
where
    F: Future,
{
    match timeout(duration, future).await {
        Ok(output) => output,
        Err(_) => panic!(
            "timed out after {duration:?} waiting for {what}, the awaited condition was never reached"
        ),
    }
}
