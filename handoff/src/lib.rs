//! Bounded producer/consumer pipeline with lock-guarded shared state.
//!
//! The crate is built around three pieces:
//!
//! - [`concurrency::channel::BoundedChannel`], a fixed-capacity FIFO channel that applies
//!   backpressure to producers and tracks every delivered item until it is acknowledged.
//! - [`concurrency::counter::GuardedCounter`], a shared integer updated only through complete
//!   read-modify-write sequences under a lock.
//! - [`pipeline::Pipeline`], which runs producers and consumers over a channel, coordinates a
//!   graceful shutdown and reports what was produced, consumed and abandoned.
//!
//! Everything runs on tokio and behaves the same on a current-thread runtime, where workers
//! interleave cooperatively, and on a multi-threaded runtime, where they run in parallel.
//!
//! ```rust,no_run
//! use handoff::pipeline::Pipeline;
//! use handoff::processor::logging::LoggingProcessor;
//! use handoff::source::ProductionQuota;
//! use handoff::source::random::RandomHexSource;
//! use handoff_config::shared::PipelineConfig;
//!
//! # async fn example() -> handoff::error::HandoffResult<()> {
//! let config = PipelineConfig::new(10, 2, 2);
//! let source = RandomHexSource::new(config.payload_size);
//! let processor = LoggingProcessor::new(config.consumer_work);
//!
//! let pipeline = Pipeline::new(config, source, processor)?;
//! let report = pipeline.run(ProductionQuota::PerProducer(100)).await?;
//! assert_eq!(report.produced, report.consumed);
//! # Ok(())
//! # }
//! ```

pub mod concurrency;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
mod macros;
pub mod metrics;
pub mod pipeline;
pub mod processor;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
