use handoff::error::ErrorKind;
use handoff::pipeline::PipelinePhase;
use handoff::source::ProductionQuota;
use handoff::test_utils::notify::within;
use handoff::test_utils::pipeline::PipelineBuilder;
use handoff::test_utils::processor::{Fault, FaultInjectingProcessor, MemoryProcessor};
use handoff::test_utils::source::{ScriptedSource, SequenceSource, Sequenced};
use handoff_telemetry::tracing::init_test_tracing;
use std::time::Duration;

#[tokio::test(flavor = "current_thread")]
async fn single_producer_single_consumer_preserves_order() {
    init_test_tracing();

    let processor = MemoryProcessor::new();
    let pipeline = PipelineBuilder::new()
        .with_capacity(2)
        .build(ScriptedSource::new(["a", "b", "c"]), processor.clone());

    let report = within("pipeline stop", pipeline.run(ProductionQuota::Unbounded))
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(processor.payloads(), vec!["a", "b", "c"]);
    assert_eq!(report.produced, 3);
    assert_eq!(report.consumed, 3);
    assert_eq!(pipeline.phase(), PipelinePhase::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scripted_scenario_preserves_order_on_preemptive_runtime() {
    init_test_tracing();

    let processor = MemoryProcessor::new();
    let pipeline = PipelineBuilder::new()
        .with_capacity(2)
        .build(ScriptedSource::new(["a", "b", "c"]), processor.clone());

    let report = within("pipeline stop", pipeline.run(ProductionQuota::PerProducer(3)))
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(processor.payloads(), vec!["a", "b", "c"]);
    assert_eq!((report.produced, report.consumed), (3, 3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn each_consumer_sees_each_producer_in_order() {
    init_test_tracing();

    let processor = MemoryProcessor::new();
    let pipeline = PipelineBuilder::new()
        .with_capacity(3)
        .with_workers(4, 3)
        .build(SequenceSource, processor.clone());

    let report = within("pipeline stop", pipeline.run(ProductionQuota::PerProducer(200)))
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.produced, 800);
    assert_eq!(report.consumed, 800);

    for (consumer, payloads) in processor.payloads_by_consumer() {
        for producer in 0..4 {
            let sequences: Vec<u64> = payloads
                .iter()
                .filter(|payload: &&Sequenced| payload.producer == producer)
                .map(|payload| payload.sequence)
                .collect();

            assert!(
                sequences.windows(2).all(|pair| pair[0] < pair[1]),
                "{consumer} saw producer-{producer} out of order"
            );
        }
    }

    let mut all = processor.payloads();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 800);
}

#[tokio::test(flavor = "current_thread")]
async fn buffering_never_exceeds_capacity() {
    init_test_tracing();

    let processor = MemoryProcessor::new().with_work(Duration::from_millis(1));
    let pipeline = PipelineBuilder::new()
        .with_capacity(3)
        .with_workers(3, 1)
        .build(SequenceSource, processor);
    let channel = pipeline.channel().clone();

    let observer = async {
        let mut max_buffered = 0;
        while pipeline.phase() != PipelinePhase::Stopped {
            max_buffered = max_buffered.max(channel.size());
            tokio::task::yield_now().await;
        }
        max_buffered
    };

    let (report, max_buffered) = within("pipeline stop", async {
        tokio::join!(pipeline.run(ProductionQuota::PerProducer(20)), observer)
    })
    .await;

    let report = report.unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.consumed, 60);
    assert!(max_buffered <= 3, "observed {max_buffered} buffered items");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_consumer_is_isolated_and_reported() {
    init_test_tracing();

    let processor = FaultInjectingProcessor::new(Fault::Error, 5);
    let pipeline = PipelineBuilder::new()
        .with_capacity(2)
        .with_workers(1, 2)
        .build(SequenceSource, processor.clone());

    let report = within("pipeline stop", pipeline.run(ProductionQuota::PerProducer(30)))
        .await
        .unwrap();

    let kinds = report.error().unwrap().kinds();
    assert!(kinds.contains(&ErrorKind::ConsumerFailed), "{kinds:?}");
    assert!(kinds.contains(&ErrorKind::InFlightLeak), "{kinds:?}");

    assert_eq!(report.produced, 30);
    assert_eq!(report.consumed, 29);
    assert_eq!(report.abandoned, 1);
    assert_eq!(processor.recorded().count(), 29);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_consumer_item_is_reported_as_abandoned() {
    init_test_tracing();

    let processor = FaultInjectingProcessor::new(Fault::Panic, 3);
    let pipeline = PipelineBuilder::new()
        .with_capacity(2)
        .with_workers(2, 2)
        .build(SequenceSource, processor);

    let report = within("pipeline stop", pipeline.run(ProductionQuota::PerProducer(10)))
        .await
        .unwrap();

    let kinds = report.error().unwrap().kinds();
    assert!(kinds.contains(&ErrorKind::ConsumerPanic), "{kinds:?}");
    assert!(kinds.contains(&ErrorKind::InFlightLeak), "{kinds:?}");
    assert_eq!(report.produced, 20);
    assert_eq!(report.consumed + report.abandoned, report.produced);
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.channel.in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn losing_every_consumer_discards_leftovers_and_unblocks_producers() {
    init_test_tracing();

    let processor = FaultInjectingProcessor::new(Fault::Error, 1);
    let pipeline = PipelineBuilder::new()
        .with_capacity(2)
        .with_workers(2, 1)
        .build(SequenceSource, processor);

    let report = within("pipeline stop", pipeline.run(ProductionQuota::Unbounded))
        .await
        .unwrap();

    let kinds = report.error().unwrap().kinds();
    assert!(kinds.contains(&ErrorKind::ConsumerFailed), "{kinds:?}");
    assert!(
        !kinds.contains(&ErrorKind::ProducerFailed),
        "producers must stop cleanly on a closed channel: {kinds:?}"
    );
    assert_eq!(report.consumed, 0);
    assert_eq!(report.abandoned, report.produced);
    assert_eq!(report.channel.buffered, 0);
    assert_eq!(report.channel.in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stuck_consumer_hits_drain_timeout() {
    init_test_tracing();

    let processor = FaultInjectingProcessor::new(Fault::Hang, 1);
    let pipeline = PipelineBuilder::new()
        .with_capacity(4)
        .with_drain_timeout(Duration::from_millis(100))
        .build(ScriptedSource::new(0..3), processor);

    let report = within("pipeline stop", pipeline.run(ProductionQuota::Unbounded))
        .await
        .unwrap();

    let kinds = report.error().unwrap().kinds();
    assert!(kinds.contains(&ErrorKind::DrainTimeout), "{kinds:?}");
    assert_eq!(report.produced, 3);
    assert_eq!(report.consumed, 0);
    assert_eq!(report.abandoned, 3);
    assert_eq!(report.channel.buffered, 0);
    assert_eq!(report.channel.in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn consumer_failing_after_drain_timeout_is_still_reported() {
    init_test_tracing();

    // The consumer blocks its thread past the drain timeout, so the abort lands too late and the
    // consumer returns its own error.
    let processor = FaultInjectingProcessor::new(Fault::Stall(Duration::from_millis(400)), 1);
    let pipeline = PipelineBuilder::new()
        .with_drain_timeout(Duration::from_millis(100))
        .build(ScriptedSource::new([1u32]), processor);

    let report = within("pipeline stop", pipeline.run(ProductionQuota::Unbounded))
        .await
        .unwrap();

    let kinds = report.error().unwrap().kinds();
    assert!(kinds.contains(&ErrorKind::DrainTimeout), "{kinds:?}");
    assert!(kinds.contains(&ErrorKind::ConsumerFailed), "{kinds:?}");
    assert_eq!(report.produced, 1);
    assert_eq!(report.abandoned, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn time_budget_stops_an_unbounded_pipeline() {
    init_test_tracing();

    let processor = MemoryProcessor::new();
    let pipeline = PipelineBuilder::new()
        .with_workers(2, 2)
        .with_run_for(Duration::from_millis(50))
        .with_producer_backoff(1, 3)
        .build(SequenceSource, processor.clone());
    assert_eq!(pipeline.config().run_for_ms, Some(50));

    let report = within("pipeline stop", pipeline.run(ProductionQuota::Unbounded))
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    assert!(report.produced > 0);
    assert_eq!(report.produced, report.consumed);
    assert_eq!(processor.count() as u64, report.consumed);
    assert_eq!(pipeline.phase(), PipelinePhase::Stopped);
}

#[tokio::test(flavor = "current_thread")]
async fn worker_failures_name_the_worker() {
    init_test_tracing();

    let processor = FaultInjectingProcessor::new(Fault::Error, 1);
    let pipeline = PipelineBuilder::new().build(ScriptedSource::new([1u32]), processor);

    let report = pipeline.run(ProductionQuota::Unbounded).await.unwrap();

    let failure = report
        .failures
        .iter()
        .find(|failure| failure.kind() == ErrorKind::ConsumerFailed)
        .unwrap();
    assert!(failure.detail().unwrap().starts_with("consumer-0: "));
}

#[tokio::test(flavor = "current_thread")]
async fn phases_are_observed_in_order() {
    init_test_tracing();

    let pipeline =
        PipelineBuilder::new().build(ScriptedSource::new(0..10), MemoryProcessor::new());
    let mut phases = pipeline.subscribe_phase();
    assert_eq!(*phases.borrow_and_update(), PipelinePhase::Created);

    let watcher = async {
        let mut seen = Vec::new();
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            seen.push(phase);
            if phase == PipelinePhase::Stopped {
                break;
            }
        }
        seen
    };

    let (report, seen) = within("pipeline stop", async {
        tokio::join!(pipeline.run(ProductionQuota::Unbounded), watcher)
    })
    .await;

    assert!(report.unwrap().is_success());

    let order = [
        PipelinePhase::Running,
        PipelinePhase::Draining,
        PipelinePhase::Stopped,
    ];
    let positions: Vec<usize> = seen
        .iter()
        .map(|phase| order.iter().position(|p| p == phase).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{seen:?}");
    assert_eq!(seen.last(), Some(&PipelinePhase::Stopped));
}
