use handoff::pipeline::PipelinePhase;
use handoff::source::ProductionQuota;
use handoff::test_utils::notify::within;
use handoff::test_utils::pipeline::PipelineBuilder;
use handoff::test_utils::processor::MemoryProcessor;
use handoff::test_utils::source::SequenceSource;
use handoff_telemetry::tracing::init_test_tracing;
use std::time::Duration;
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_drains_everything_that_was_produced() {
    init_test_tracing();

    let processor = MemoryProcessor::new().with_work(Duration::from_millis(2));
    let pipeline = PipelineBuilder::new()
        .with_capacity(5)
        .with_workers(3, 2)
        .build(SequenceSource, processor.clone());

    let stopper = async {
        processor.wait_for_count(10).await;
        pipeline.shutdown();
    };

    let (report, ()) = within("pipeline stop", async {
        tokio::join!(pipeline.run(ProductionQuota::Unbounded), stopper)
    })
    .await;

    let report = report.unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert!(report.produced >= 10);
    assert_eq!(report.produced, report.consumed);
    assert_eq!(report.abandoned, 0);
    assert_eq!(report.channel.buffered, 0);
    assert_eq!(report.channel.in_flight, 0);
    assert_eq!(processor.count() as u64, report.consumed);
}

#[tokio::test(flavor = "current_thread")]
async fn shutdown_drains_everything_on_cooperative_runtime() {
    init_test_tracing();

    let processor = MemoryProcessor::new();
    let pipeline = PipelineBuilder::new()
        .with_capacity(4)
        .with_workers(2, 2)
        .build(SequenceSource, processor.clone());

    let stopper = async {
        processor.wait_for_count(25).await;
        pipeline.shutdown();
    };

    let (report, ()) = within("pipeline stop", async {
        tokio::join!(pipeline.run(ProductionQuota::Unbounded), stopper)
    })
    .await;

    let report = report.unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.produced, report.consumed);
    assert_eq!(report.channel.buffered, 0);
    assert_eq!(report.channel.in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_releases_producers_blocked_on_a_full_channel() {
    init_test_tracing();

    let processor = MemoryProcessor::new().with_work(Duration::from_millis(20));
    let pipeline = PipelineBuilder::new()
        .with_capacity(1)
        .with_workers(4, 1)
        .build(SequenceSource, processor.clone());

    let stopper = async {
        processor.wait_for_count(1).await;
        // Producers are parked on `put` behind the slow consumer.
        pipeline.shutdown();
    };

    let (report, ()) = within("pipeline stop", async {
        tokio::join!(pipeline.run(ProductionQuota::Unbounded), stopper)
    })
    .await;

    let report = report.unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.produced, report.consumed);
    assert!(report.produced < 10, "produced {}", report.produced);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_shutdown_requests_are_idempotent() {
    init_test_tracing();

    let pipeline = PipelineBuilder::new()
        .with_workers(2, 2)
        .build(SequenceSource, MemoryProcessor::new());
    let shutdown_tx = pipeline.shutdown_tx();

    let requests = async {
        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let shutdown_tx = shutdown_tx.clone();
            tasks.spawn(async move { shutdown_tx.shutdown() });
        }

        let mut raised = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                raised += 1;
            }
        }

        pipeline.shutdown();
        raised
    };

    let (report, raised) = within("pipeline stop", async {
        tokio::join!(pipeline.run(ProductionQuota::Unbounded), requests)
    })
    .await;

    assert_eq!(raised, 1);

    let report = report.unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.produced, report.consumed);
    assert_eq!(pipeline.phase(), PipelinePhase::Stopped);
    assert!(shutdown_tx.is_shutdown());
}
