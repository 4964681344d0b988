use handoff::error::ErrorKind;
use handoff::failpoints::{CONSUMER_BEFORE_ACK, PRODUCER_BEFORE_PUT};
use handoff::source::ProductionQuota;
use handoff::test_utils::failpoints::HandoffFailScenario;
use handoff::test_utils::notify::within;
use handoff::test_utils::pipeline::PipelineBuilder;
use handoff::test_utils::processor::MemoryProcessor;
use handoff::test_utils::source::SequenceSource;
use handoff_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn consumer_failing_before_ack_leaks_one_item() {
    init_test_tracing();
    let _scenario = HandoffFailScenario::setup(&[(CONSUMER_BEFORE_ACK, "1*return")]);

    let processor = MemoryProcessor::new();
    let pipeline = PipelineBuilder::new()
        .with_workers(1, 2)
        .build(SequenceSource, processor.clone());

    let report = within("pipeline stop", pipeline.run(ProductionQuota::PerProducer(20)))
        .await
        .unwrap();

    let err = report.error().unwrap();
    assert!(err.kinds().contains(&ErrorKind::ConsumerFailed));
    assert!(err.kinds().contains(&ErrorKind::InFlightLeak));

    // The item was processed but never acknowledged.
    assert_eq!(processor.count(), 20);
    assert_eq!(report.consumed, 19);
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.channel.in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn consumer_panicking_before_ack_is_reported() {
    init_test_tracing();
    let _scenario = HandoffFailScenario::setup(&[(CONSUMER_BEFORE_ACK, "1*panic(injected)")]);

    let pipeline = PipelineBuilder::new()
        .with_workers(2, 2)
        .build(SequenceSource, MemoryProcessor::new());

    let report = within("pipeline stop", pipeline.run(ProductionQuota::PerProducer(10)))
        .await
        .unwrap();

    let err = report.error().unwrap();
    assert!(err.kinds().contains(&ErrorKind::ConsumerPanic));
    assert_eq!(report.consumed + report.abandoned, report.produced);
    assert_eq!(report.abandoned, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn failing_producers_stop_without_stalling_the_pipeline() {
    init_test_tracing();
    let _scenario = HandoffFailScenario::setup(&[(PRODUCER_BEFORE_PUT, "return")]);

    let pipeline = PipelineBuilder::new()
        .with_workers(3, 1)
        .build(SequenceSource, MemoryProcessor::new());

    let report = within("pipeline stop", pipeline.run(ProductionQuota::Unbounded))
        .await
        .unwrap();

    let producer_failures = report
        .failures
        .iter()
        .filter(|failure| failure.kind() == ErrorKind::ProducerFailed)
        .count();
    assert_eq!(producer_failures, 3);
    assert_eq!(report.produced, 0);
    assert_eq!(report.consumed, 0);
}
