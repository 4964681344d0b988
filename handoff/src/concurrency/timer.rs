//! Deadline future for optional branches of `tokio::select!`.
//!
//! A [`DeferredTimer`] stays pending until it is armed, so a pipeline can keep a single
//! `select!` loop whether or not a time budget or a drain timeout applies.

use handoff_config::shared::BackoffConfig;
use pin_project_lite::pin_project;
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Sleep, sleep};

pin_project! {
    /// Timer that resolves once its armed deadline elapses and is pending forever otherwise.
    ///
    /// The timer is not [`Unpin`]; pin it with [`tokio::pin!`] before polling it by reference.
    #[derive(Debug)]
    pub struct DeferredTimer {
        #[pin]
        deadline: Option<Sleep>,
    }
}

impl DeferredTimer {
    /// Creates an unarmed timer.
    pub fn disarmed() -> Self {
        Self { deadline: None }
    }

    /// Creates a timer armed for `duration` if one is given, unarmed otherwise.
    pub fn after(duration: Option<Duration>) -> Self {
        Self {
            deadline: duration.map(sleep),
        }
    }

    /// Arms the timer to resolve after `duration`, replacing any previous deadline.
    pub fn arm(self: Pin<&mut Self>, duration: Duration) {
        self.project().deadline.set(Some(sleep(duration)));
    }

    /// Removes the deadline, the timer is pending again until re-armed.
    pub fn disarm(self: Pin<&mut Self>) {
        self.project().deadline.set(None);
    }

    /// Returns `true` if a deadline is set.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Future for DeferredTimer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().deadline.as_pin_mut() {
            Some(deadline) => deadline.poll(cx),
            None => Poll::Pending,
        }
    }
}

/// Draws a delay uniformly from the configured range, or `None` if the range is disabled.
pub fn random_delay(backoff: &BackoffConfig) -> Option<Duration> {
    if backoff.is_disabled() {
        return None;
    }

    let millis = if backoff.min_ms >= backoff.max_ms {
        backoff.max_ms
    } else {
        rand::thread_rng().gen_range(backoff.min_ms..=backoff.max_ms)
    };

    Some(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_delay_stays_in_range() {
        assert_eq!(random_delay(&BackoffConfig::default()), None);
        assert_eq!(
            random_delay(&BackoffConfig::new(3, 3)),
            Some(Duration::from_millis(3))
        );

        let backoff = BackoffConfig::new(1, 10);
        for _ in 0..100 {
            let delay = random_delay(&backoff).unwrap();
            assert!(delay >= backoff.min() && delay <= backoff.max());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_stops_firing() {
        let timer = DeferredTimer::after(Some(Duration::from_millis(10)));
        tokio::pin!(timer);

        timer.as_mut().await;
        timer.as_mut().disarm();

        let result = tokio::time::timeout(Duration::from_secs(60), timer).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let timer = DeferredTimer::after(None);
        assert!(!timer.is_armed());

        let result = tokio::time::timeout(Duration::from_secs(3600), timer).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_fires_after_duration() {
        let timer = DeferredTimer::disarmed();
        tokio::pin!(timer);

        timer.as_mut().arm(Duration::from_millis(50));
        assert!(timer.is_armed());

        let started = tokio::time::Instant::now();
        timer.await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
