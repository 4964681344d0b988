use handoff::concurrency::counter::{GuardedCounter, increment_concurrently};
use handoff::test_utils::counter::UnguardedCounter;
use handoff_config::shared::LockStrategy;
use handoff_telemetry::tracing::init_test_tracing;
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tokio::task::JoinSet;

const WORKERS: usize = 10;
const TRIALS: usize = 5;

#[tokio::test(flavor = "current_thread")]
async fn unguarded_counter_loses_updates_on_cooperative_runtime() {
    init_test_tracing();

    let counter = Arc::new(UnguardedCounter::new());

    let mut tasks = JoinSet::new();
    for _ in 0..WORKERS {
        let counter = counter.clone();
        tasks.spawn(async move { counter.increment().await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    // Tasks interleave at the yield between the load and the store.
    assert!(
        counter.value() < WORKERS as i64,
        "expected lost updates, got {}",
        counter.value()
    );
}

#[tokio::test(flavor = "current_thread")]
async fn guarded_counter_keeps_every_update_on_cooperative_runtime() {
    init_test_tracing();

    for trial in 0..TRIALS {
        for strategy in [LockStrategy::Plain, LockStrategy::Reentrant] {
            let counter = Arc::new(GuardedCounter::new(strategy));

            let report = increment_concurrently(&counter, WORKERS, 1).await.unwrap();

            assert_eq!(report.end_value, WORKERS as i64, "{strategy} trial {trial}");
        }
    }
}

#[test]
fn unguarded_counter_loses_updates_on_os_threads() {
    init_test_tracing();

    let counter = UnguardedCounter::with_delay(Duration::from_millis(20));
    let barrier = Barrier::new(WORKERS);

    std::thread::scope(|scope| {
        for _ in 0..WORKERS {
            scope.spawn(|| {
                barrier.wait();
                counter.blocking_increment();
            });
        }
    });

    assert!(
        counter.value() < WORKERS as i64,
        "expected lost updates, got {}",
        counter.value()
    );
}

#[test]
fn guarded_counter_keeps_every_update_on_os_threads() {
    init_test_tracing();

    for trial in 0..TRIALS {
        for strategy in [LockStrategy::Plain, LockStrategy::Reentrant] {
            let counter = GuardedCounter::new(strategy)
                .with_critical_section_delay(Duration::from_millis(2));
            let barrier = Barrier::new(WORKERS);

            std::thread::scope(|scope| {
                for _ in 0..WORKERS {
                    scope.spawn(|| {
                        barrier.wait();
                        counter.increment();
                    });
                }
            });

            assert_eq!(counter.value(), WORKERS as i64, "{strategy} trial {trial}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counter_exactness_holds_for_every_size() {
    init_test_tracing();

    for workers in [1usize, 10, 1000] {
        let counter = Arc::new(GuardedCounter::with_initial(LockStrategy::Plain, 100));

        let report = increment_concurrently(&counter, workers, 1).await.unwrap();

        assert_eq!(report.start_value, 100);
        assert_eq!(report.end_value, 100 + workers as i64);
        assert!(report.is_exact());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nested_increments_under_reentrant_lock_are_exact() {
    init_test_tracing();

    let counter = Arc::new(GuardedCounter::new(LockStrategy::Reentrant));

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let counter = counter.clone();
        tasks.spawn(async move {
            for _ in 0..50 {
                counter.with_lock(|guard| {
                    let before = guard.get();
                    counter.increment();
                    assert_eq!(guard.get(), before + 1);
                });
                tokio::task::yield_now().await;
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    assert_eq!(counter.value(), 400);
}
