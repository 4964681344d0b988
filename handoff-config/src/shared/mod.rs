//! Shared configuration types for handoff pipelines.

mod backoff;
mod base;
mod counter;
mod pipeline;
mod runner;
mod scheduler;

pub use backoff::BackoffConfig;
pub use base::ValidationError;
pub use counter::{CounterConfig, LockStrategy};
pub use pipeline::PipelineConfig;
pub use runner::RunnerConfig;
pub use scheduler::{SchedulerConfig, SchedulerKind};
