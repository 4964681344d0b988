//! Producer/consumer pipeline over a [`BoundedChannel`].
//!
//! A [`Pipeline`] moves through [`PipelinePhase::Running`], [`PipelinePhase::Draining`] and
//! [`PipelinePhase::Stopped`]:
//!
//! - While running, producers put items into the channel and consumers get, process and
//!   acknowledge them.
//! - Draining starts when shutdown is requested or every producer finished. The channel is closed,
//!   so no new item is accepted, and consumers keep working through what is buffered.
//! - The pipeline stops once nothing is buffered and nothing is in flight. Consumers then observe
//!   the end of the stream and exit.
//!
//! Drain completion is decided by the channel's acknowledgement counters alone. Worker failures
//! never abort the pipeline; they are collected and reported once it stops.

use handoff_config::shared::PipelineConfig;
use metrics::counter;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::concurrency::channel::{BoundedChannel, ChannelStats};
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel, wait_for_shutdown};
use crate::concurrency::timer::DeferredTimer;
use crate::error::{ErrorKind, HandoffError, HandoffResult};
use crate::handoff_error;
use crate::metrics::{HANDOFF_PIPELINE_PHASE_TRANSITIONS_TOTAL, PHASE_LABEL};
use crate::processor::ItemProcessor;
use crate::source::{ItemSource, ProductionQuota};
use crate::types::{WorkerId, WorkerKind, serialize_millis};
use crate::workers::consumer::Consumer;
use crate::workers::pool::{WorkerExit, WorkerPool, failure_kind};
use crate::workers::producer::Producer;

/// Lifecycle phase of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// Built but not running yet.
    Created,
    /// Producers and consumers are active.
    Running,
    /// Producers are done and consumers are emptying the channel.
    Draining,
    /// Every item was acknowledged or abandoned and every worker was joined.
    Stopped,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Created => "created",
            PipelinePhase::Running => "running",
            PipelinePhase::Draining => "draining",
            PipelinePhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a pipeline run.
///
/// At [`PipelinePhase::Stopped`], `produced == consumed + abandoned` always holds.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Items put into the channel.
    pub produced: u64,
    /// Items acknowledged by consumers.
    pub consumed: u64,
    /// Items that left the channel without acknowledgement.
    pub abandoned: u64,
    /// Wall time between the start of the run and the stop.
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Final channel counters.
    pub channel: ChannelStats,
    /// Every failure observed during the run, in the order it was observed.
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<HandoffError>,
}

impl PipelineReport {
    /// Returns `true` when no failure was observed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns all failures aggregated into one error, or `None` if there were none.
    pub fn error(&self) -> Option<HandoffError> {
        if self.failures.is_empty() {
            return None;
        }

        Some(self.failures.clone().into())
    }

    /// Converts the report into an error if any failure was observed.
    pub fn into_result(self) -> HandoffResult<Self> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

fn serialize_failures<S>(failures: &[HandoffError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(failures.iter().map(|failure| failure.to_string()))
}

/// Bounded producer/consumer pipeline.
///
/// Producers draw payloads from a clone of the [`ItemSource`], consumers hand each delivered item
/// to a clone of the [`ItemProcessor`].
pub struct Pipeline<S, P>
where
    S: ItemSource,
{
    config: Arc<PipelineConfig>,
    source: S,
    processor: P,
    channel: BoundedChannel<S::Payload>,
    shutdown_tx: ShutdownTx,
    phase_tx: watch::Sender<PipelinePhase>,
}

impl<S, P> Pipeline<S, P>
where
    S: ItemSource + Clone + Send + Sync + 'static,
    P: ItemProcessor<S::Payload> + Clone + Send + Sync + 'static,
{
    /// Creates a pipeline from a validated `config`.
    pub fn new(config: PipelineConfig, source: S, processor: P) -> HandoffResult<Self> {
        config.validate()?;

        let channel = BoundedChannel::new(config.capacity)?;
        let (shutdown_tx, _) = create_shutdown_channel();
        let (phase_tx, _) = watch::channel(PipelinePhase::Created);

        Ok(Self {
            config: Arc::new(config),
            source,
            processor,
            channel,
            shutdown_tx,
            phase_tx,
        })
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns a handle to the channel, mostly useful to observe its counters.
    pub fn channel(&self) -> &BoundedChannel<S::Payload> {
        &self.channel
    }

    /// Returns a transmitter that can request shutdown from anywhere.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Requests a graceful shutdown. Calling it more than once has no further effect.
    pub fn shutdown(&self) {
        if self.shutdown_tx.shutdown() {
            info!("shutdown requested for the pipeline");
        } else {
            debug!("shutdown was already requested for the pipeline");
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> PipelinePhase {
        *self.phase_tx.borrow()
    }

    /// Subscribes to phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<PipelinePhase> {
        self.phase_tx.subscribe()
    }

    /// Runs the pipeline until it stops and returns the report.
    ///
    /// Worker failures do not make this method fail, they are listed in
    /// [`PipelineReport::failures`]. The only error returned directly is
    /// [`ErrorKind::InvalidState`] when the pipeline already ran.
    pub async fn run(&self, quota: ProductionQuota) -> HandoffResult<PipelineReport> {
        let started = self.phase_tx.send_if_modified(|phase| {
            if *phase != PipelinePhase::Created {
                return false;
            }

            *phase = PipelinePhase::Running;
            true
        });
        if !started {
            bail!(
                ErrorKind::InvalidState,
                "Pipeline can only run once",
                format!("The pipeline is in phase '{}'", self.phase())
            );
        }
        record_transition(PipelinePhase::Running);

        info!(
            capacity = self.config.capacity,
            producers = self.config.producers,
            consumers = self.config.consumers,
            ?quota,
            source = S::name(),
            processor = P::name(),
            "starting pipeline"
        );

        let started_at = Instant::now();
        let mut failures = Vec::new();
        let mut discarded = 0u64;

        let mut consumers = WorkerPool::new(WorkerKind::Consumer);
        for index in 0..self.config.consumers {
            Consumer::new(
                WorkerId::consumer(index),
                self.channel.clone(),
                self.processor.clone(),
            )
            .spawn_into(&mut consumers);
        }

        let mut producers = WorkerPool::new(WorkerKind::Producer);
        for index in 0..self.config.producers {
            Producer::new(
                WorkerId::producer(index),
                self.source.clone(),
                self.channel.clone(),
                quota,
                self.config.producer_backoff,
                self.shutdown_tx.subscribe(),
            )
            .spawn_into(&mut producers);
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let run_for = DeferredTimer::after(self.config.run_for());
        tokio::pin!(run_for);
        let mut draining = false;

        while !producers.is_empty() {
            tokio::select! {
                Some(exit) = producers.join_next() => record_exit(exit, &mut failures),
                Some(exit) = consumers.join_next(), if !consumers.is_empty() => {
                    record_exit(exit, &mut failures);

                    if consumers.is_empty() {
                        error!("every consumer terminated while producers were running");

                        if !draining {
                            draining = true;
                            self.begin_draining("no consumer left");
                        }
                        discarded += self.channel.close_and_discard() as u64;
                    }
                }
                _ = &mut run_for => {
                    run_for.as_mut().disarm();
                    info!(run_for_ms = self.config.run_for_ms, "time budget elapsed");
                    self.shutdown();
                }
                _ = wait_for_shutdown(&mut shutdown_rx), if !draining => {
                    draining = true;
                    self.begin_draining("shutdown requested");
                }
            }
        }

        if !draining {
            self.begin_draining("all producers finished");
        }

        let drain_timeout = self.config.drain_timeout();
        let drain_timer = DeferredTimer::after(Some(drain_timeout));
        tokio::pin!(drain_timer);
        let mut timed_out = false;

        loop {
            tokio::select! {
                biased;

                _ = self.channel.wait_drained() => {
                    debug!("channel drained");
                    break;
                }
                Some(exit) = consumers.join_next(), if !consumers.is_empty() => {
                    record_exit(exit, &mut failures);

                    if consumers.is_empty() {
                        error!("every consumer terminated before the channel was drained");
                        discarded += self.channel.close_and_discard() as u64;
                    }
                }
                _ = &mut drain_timer => {
                    let stats = self.channel.stats();
                    error!(
                        drain_timeout_ms = drain_timeout.as_millis() as u64,
                        buffered = stats.buffered,
                        in_flight = stats.in_flight,
                        "drain timed out, aborting consumers"
                    );

                    consumers.abort_all();
                    timed_out = true;
                    break;
                }
            }
        }

        // Consumers see the end of the stream now that the channel is closed and empty.
        while let Some(exit) = consumers.join_next().await {
            // Only the abort is expected here, a consumer may still fail on its own before it lands.
            if timed_out && exit.cancelled {
                debug!(worker = %exit.id, "consumer aborted after drain timeout");
                continue;
            }

            record_exit(exit, &mut failures);
        }

        if timed_out {
            discarded += self.channel.close_and_discard() as u64;
        }

        let stats = self.channel.stats();
        let leaked = stats.abandoned.saturating_sub(discarded);

        if timed_out {
            failures.push(handoff_error!(
                ErrorKind::DrainTimeout,
                "Pipeline did not drain in time",
                format!(
                    "Consumers were aborted after {}ms, {leaked} in-flight and {discarded} buffered items were abandoned",
                    drain_timeout.as_millis()
                )
            ));
        } else if discarded > 0 {
            failures.push(handoff_error!(
                ErrorKind::UndrainedItems,
                "Buffered items were discarded",
                format!("{discarded} buffered items were discarded because no consumer was left")
            ));
        }

        if leaked > 0 {
            failures.push(handoff_error!(
                ErrorKind::InFlightLeak,
                "Delivered items were never acknowledged",
                format!("{leaked} items were taken from the channel and abandoned before acknowledgement")
            ));
        }

        self.set_phase(PipelinePhase::Stopped);

        let report = PipelineReport {
            produced: stats.enqueued,
            consumed: stats.acknowledged,
            abandoned: stats.abandoned,
            elapsed: started_at.elapsed(),
            channel: stats,
            failures,
        };

        if report.is_success() {
            info!(
                produced = report.produced,
                consumed = report.consumed,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "pipeline stopped"
            );
        } else {
            warn!(
                produced = report.produced,
                consumed = report.consumed,
                abandoned = report.abandoned,
                failures = report.failures.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "pipeline stopped with failures"
            );
        }

        Ok(report)
    }

    /// Moves to [`PipelinePhase::Draining`] and closes the channel to new items.
    fn begin_draining(&self, reason: &'static str) {
        self.set_phase(PipelinePhase::Draining);
        self.channel.close();

        let stats = self.channel.stats();
        info!(
            reason,
            buffered = stats.buffered,
            in_flight = stats.in_flight,
            "pipeline draining"
        );
    }

    fn set_phase(&self, phase: PipelinePhase) {
        self.phase_tx.send_replace(phase);
        record_transition(phase);
    }
}

impl<S, P> fmt::Debug for Pipeline<S, P>
where
    S: ItemSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("phase", &*self.phase_tx.borrow())
            .field("shutdown_requested", &self.shutdown_tx.is_shutdown())
            .finish_non_exhaustive()
    }
}

fn record_transition(phase: PipelinePhase) {
    counter!(HANDOFF_PIPELINE_PHASE_TRANSITIONS_TOTAL, PHASE_LABEL => phase.as_str()).increment(1);
}

/// Collects the outcome of a joined worker, attaching the worker identity to failures.
fn record_exit(exit: WorkerExit, failures: &mut Vec<HandoffError>) {
    match exit.result {
        Ok(handled) => debug!(worker = %exit.id, handled, "worker finished"),
        Err(err) => failures.push(attribute_failure(exit.id, err)),
    }
}

fn attribute_failure(id: WorkerId, err: HandoffError) -> HandoffError {
    // Failures built by the pool already name the worker.
    if matches!(
        err.kind(),
        ErrorKind::ProducerFailed
            | ErrorKind::ConsumerFailed
            | ErrorKind::ProducerPanic
            | ErrorKind::ConsumerPanic
    ) {
        return err;
    }

    let description = match id.kind {
        WorkerKind::Producer => "Producer terminated with an error",
        WorkerKind::Consumer => "Consumer terminated with an error",
    };

    handoff_error!(
        failure_kind(id.kind),
        description,
        format!("{id}: {err}"),
        source: err
    )
}
