use handoff::concurrency::counter::{CounterReport, GuardedCounter, increment_concurrently};
use handoff::concurrency::shutdown::ShutdownTx;
use handoff::pipeline::{Pipeline, PipelineReport};
use handoff::processor::logging::LoggingProcessor;
use handoff::source::ProductionQuota;
use handoff::source::random::RandomHexSource;
use handoff_config::shared::{CounterConfig, PipelineConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RunnerResult;

/// Runs a pipeline of random hex payloads until its quota, time budget or a signal stops it.
///
/// The returned report may carry worker failures. It is up to the caller to decide whether
/// they fail the run.
pub async fn run_pipeline(config: PipelineConfig) -> RunnerResult<PipelineReport> {
    log_pipeline_config(&config);

    let quota = ProductionQuota::from(config.items_per_producer);
    let source = RandomHexSource::new(config.payload_size);
    let processor = LoggingProcessor::new(config.consumer_work);
    let pipeline = Pipeline::new(config, source, processor)?;

    // SIGINT and SIGTERM raise the same shutdown signal as an elapsed time budget.
    let shutdown_handle = tokio::spawn(shutdown_on_signal(pipeline.shutdown_tx()));

    let result = pipeline.run(quota).await;

    // The pipeline may have stopped on its own, in which case nobody is listening anymore.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    let report = result?;
    info!(
        produced = report.produced,
        consumed = report.consumed,
        abandoned = report.abandoned,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "pipeline completed"
    );

    Ok(report)
}

/// Runs the counter contention demo on the current runtime.
pub async fn run_counter(config: CounterConfig) -> RunnerResult<CounterReport> {
    debug!(
        workers = config.workers,
        increments_per_worker = config.increments_per_worker,
        lock_strategy = %config.lock_strategy,
        critical_section_delay_ms = config.critical_section_delay_ms,
        "counter config"
    );

    let mut counter = GuardedCounter::new(config.lock_strategy);
    if let Some(delay) = config.critical_section_delay() {
        counter = counter.with_critical_section_delay(delay);
    }
    let counter = Arc::new(counter);

    let report =
        increment_concurrently(&counter, config.workers, config.increments_per_worker).await?;

    if !report.is_exact() {
        warn!(
            expected = report.expected_value(),
            actual = report.end_value,
            "counter lost updates"
        );
    }

    Ok(report)
}

#[cfg(unix)]
async fn shutdown_on_signal(shutdown_tx: ShutdownTx) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(err) => {
            warn!(error = %err, "failed to register sigterm handler, only ctrl+c is handled");
            None
        }
    };
    let sigterm_received = async {
        match sigterm.as_mut() {
            Some(sigterm) => {
                sigterm.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "failed to listen for ctrl+c");
                return;
            }
            info!("sigint (ctrl+c) received, shutting down pipeline");
        }
        _ = sigterm_received => {
            info!("sigterm received, shutting down pipeline");
        }
    }

    shutdown_tx.shutdown();
}

#[cfg(not(unix))]
async fn shutdown_on_signal(shutdown_tx: ShutdownTx) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl+c");
        return;
    }

    info!("ctrl+c received, shutting down pipeline");
    shutdown_tx.shutdown();
}

fn log_pipeline_config(config: &PipelineConfig) {
    debug!(
        capacity = config.capacity,
        producers = config.producers,
        consumers = config.consumers,
        items_per_producer = config.items_per_producer,
        run_for_ms = config.run_for_ms,
        drain_timeout_ms = config.drain_timeout_ms,
        payload_size = config.payload_size,
        "pipeline config"
    );
    debug!(
        producer_backoff_min_ms = config.producer_backoff.min_ms,
        producer_backoff_max_ms = config.producer_backoff.max_ms,
        consumer_work_min_ms = config.consumer_work.min_ms,
        consumer_work_max_ms = config.consumer_work.max_ms,
        "pipeline timing config"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_config::shared::{BackoffConfig, LockStrategy};

    #[tokio::test(flavor = "current_thread")]
    async fn quota_pipeline_consumes_everything() {
        let mut config = PipelineConfig::new(2, 2, 2);
        config.items_per_producer = Some(5);
        config.producer_backoff = BackoffConfig::new(0, 0);
        config.consumer_work = BackoffConfig::new(0, 0);

        let report = run_pipeline(config).await.unwrap();

        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(report.produced, 10);
        assert_eq!(report.consumed, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn counter_demo_is_exact() {
        let config = CounterConfig {
            workers: 10,
            increments_per_worker: 5,
            lock_strategy: LockStrategy::Reentrant,
            critical_section_delay_ms: 0,
        };

        let report = run_counter(config).await.unwrap();

        assert!(report.is_exact());
        assert_eq!(report.end_value, 50);
    }
}
