use handoff::concurrency::channel::BoundedChannel;
use handoff::error::ErrorKind;
use handoff_telemetry::tracing::init_test_tracing;
use std::collections::HashSet;
use std::sync::Barrier;

#[test]
fn os_thread_producers_feed_async_consumers() {
    init_test_tracing();

    let channel = BoundedChannel::<u32>::new(4).unwrap();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let channel = channel.clone();
            runtime.spawn(async move {
                let mut seen = Vec::new();
                loop {
                    match channel.get().await {
                        Ok(delivery) => {
                            seen.push(*delivery.payload());
                            delivery.ack();
                        }
                        Err(err) => {
                            assert_eq!(err.kind(), ErrorKind::ChannelEof);
                            return seen;
                        }
                    }
                }
            })
        })
        .collect();

    std::thread::scope(|scope| {
        for producer in 0..3u32 {
            let channel = &channel;
            scope.spawn(move || {
                for sequence in 0..100u32 {
                    channel.blocking_put(producer * 1000 + sequence).unwrap();
                }
            });
        }
    });

    channel.blocking_wait_drained();
    channel.close();

    let mut all = HashSet::new();
    for consumer in consumers {
        let seen = runtime.block_on(consumer).unwrap();
        for value in seen {
            assert!(all.insert(value), "{value} delivered twice");
        }
    }

    assert_eq!(all.len(), 300);

    let stats = channel.stats();
    assert_eq!(stats.enqueued, 300);
    assert_eq!(stats.acknowledged, 300);
    assert_eq!(stats.abandoned, 0);
}

#[test]
fn deliveries_dropped_on_other_threads_still_drain() {
    init_test_tracing();

    let channel = BoundedChannel::<u64>::new(8).unwrap();
    for value in 0..8 {
        channel.blocking_put(value).unwrap();
    }
    channel.close();

    let barrier = Barrier::new(4);
    std::thread::scope(|scope| {
        for worker in 0..4 {
            let channel = &channel;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                while let Ok(delivery) = channel.blocking_get() {
                    if worker == 0 {
                        drop(delivery);
                    } else {
                        delivery.ack();
                    }
                }
            });
        }
    });

    channel.blocking_wait_drained();

    let stats = channel.stats();
    assert!(stats.closed);
    assert_eq!(stats.buffered, 0);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.acknowledged + stats.abandoned, 8);
}
