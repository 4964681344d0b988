//! Command line harness for handoff pipelines.
//!
//! Builds the runtime for the configured scheduling model, runs either a producer/consumer
//! pipeline or the counter contention demo, and prints the final report.

use clap::{Args, Parser, Subcommand, ValueEnum};
use handoff_config::shared::{LockStrategy, RunnerConfig, SchedulerKind};
use handoff_telemetry::metrics::{init_metrics_handle, render_metrics};
use handoff_telemetry::tracing::init_tracing;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use crate::config::load_runner_config;
use crate::core::{run_counter, run_pipeline};
use crate::error::{RunnerError, RunnerResult};

mod config;
mod core;
mod error;

#[derive(Debug, Parser)]
#[command(name = "handoff", version, about)]
struct AppArgs {
    /// Directory holding `base.yaml` and environment overrides (default: ./configuration if present)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Scheduling model used to run workers
    #[arg(long, global = true, value_enum)]
    scheduler: Option<SchedulerArg>,

    /// Number of OS threads for the preemptive scheduler
    #[arg(long, global = true)]
    worker_threads: Option<usize>,

    /// Print the final report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Print a Prometheus snapshot of the recorded metrics before exiting
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run producers and consumers over a bounded channel
    Pipeline(PipelineArgs),
    /// Increment a shared counter from many workers
    Counter(CounterArgs),
}

#[derive(Debug, Args)]
struct PipelineArgs {
    /// Maximum number of buffered items
    #[arg(long)]
    capacity: Option<usize>,

    /// Number of producer workers
    #[arg(long)]
    producers: Option<usize>,

    /// Number of consumer workers
    #[arg(long)]
    consumers: Option<usize>,

    /// Items each producer emits before stopping (default: unbounded)
    #[arg(long)]
    items_per_producer: Option<u64>,

    /// Request shutdown after this many milliseconds
    #[arg(long)]
    run_for_ms: Option<u64>,

    /// Give up draining after this many milliseconds
    #[arg(long)]
    drain_timeout_ms: Option<u64>,

    /// Number of random bytes per payload
    #[arg(long)]
    payload_size: Option<usize>,
}

#[derive(Debug, Args)]
struct CounterArgs {
    /// Number of concurrent workers
    #[arg(long)]
    workers: Option<usize>,

    /// Increments performed by each worker
    #[arg(long)]
    increments: Option<u64>,

    /// Lock used to guard the counter
    #[arg(long, value_enum)]
    lock_strategy: Option<LockStrategyArg>,

    /// Sleep inside the critical section for this many milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchedulerArg {
    Cooperative,
    Preemptive,
}

impl From<SchedulerArg> for SchedulerKind {
    fn from(arg: SchedulerArg) -> Self {
        match arg {
            SchedulerArg::Cooperative => SchedulerKind::Cooperative,
            SchedulerArg::Preemptive => SchedulerKind::Preemptive,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LockStrategyArg {
    Plain,
    Reentrant,
}

impl From<LockStrategyArg> for LockStrategy {
    fn from(arg: LockStrategyArg) -> Self {
        match arg {
            LockStrategyArg::Plain => LockStrategy::Plain,
            LockStrategyArg::Reentrant => LockStrategy::Reentrant,
        }
    }
}

fn main() {
    if let Err(err) = main_impl() {
        eprint!("{}", err.render_report());
        std::process::exit(1);
    }
}

fn main_impl() -> RunnerResult<()> {
    let args = AppArgs::parse();

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(RunnerError::config)?;

    let mut config = load_runner_config(args.config_dir.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate().map_err(RunnerError::config)?;

    let runtime = build_runtime(&config)?;
    info!(scheduler = ?config.scheduler.kind, "runtime started");

    runtime.block_on(async_main(args, config))
}

/// Runs the selected command on the runtime built for it.
async fn async_main(args: AppArgs, config: RunnerConfig) -> RunnerResult<()> {
    // Installed inside the runtime so the upkeep task has somewhere to run.
    init_metrics_handle().map_err(RunnerError::config)?;

    match args.command {
        Command::Pipeline(_) => {
            let report = run_pipeline(config.pipeline).await?;
            print_output(&render_output(&report, args.json)?, args.print_metrics);

            // Worker failures fail the run once the report is out.
            report.into_result()?;
        }
        Command::Counter(_) => {
            let report = run_counter(config.counter).await?;
            print_output(&render_output(&report, args.json)?, args.print_metrics);
        }
    }

    Ok(())
}

fn build_runtime(config: &RunnerConfig) -> RunnerResult<tokio::runtime::Runtime> {
    let runtime = match config.scheduler.kind {
        SchedulerKind::Cooperative => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?,
        SchedulerKind::Preemptive => {
            let mut builder = tokio::runtime::Builder::new_multi_thread();
            if let Some(worker_threads) = config.scheduler.worker_threads {
                builder.worker_threads(worker_threads);
            }
            builder.enable_all().build()?
        }
    };

    Ok(runtime)
}

fn apply_overrides(config: &mut RunnerConfig, args: &AppArgs) {
    if let Some(scheduler) = args.scheduler {
        config.scheduler.kind = scheduler.into();
    }
    if let Some(worker_threads) = args.worker_threads {
        config.scheduler.worker_threads = Some(worker_threads);
    }

    match &args.command {
        Command::Pipeline(pipeline) => {
            let target = &mut config.pipeline;
            if let Some(capacity) = pipeline.capacity {
                target.capacity = capacity;
            }
            if let Some(producers) = pipeline.producers {
                target.producers = producers;
            }
            if let Some(consumers) = pipeline.consumers {
                target.consumers = consumers;
            }
            if pipeline.items_per_producer.is_some() {
                target.items_per_producer = pipeline.items_per_producer;
            }
            if pipeline.run_for_ms.is_some() {
                target.run_for_ms = pipeline.run_for_ms;
            }
            if let Some(drain_timeout_ms) = pipeline.drain_timeout_ms {
                target.drain_timeout_ms = drain_timeout_ms;
            }
            if let Some(payload_size) = pipeline.payload_size {
                target.payload_size = payload_size;
            }
        }
        Command::Counter(counter) => {
            let target = &mut config.counter;
            if let Some(workers) = counter.workers {
                target.workers = workers;
            }
            if let Some(increments) = counter.increments {
                target.increments_per_worker = increments;
            }
            if let Some(lock_strategy) = counter.lock_strategy {
                target.lock_strategy = lock_strategy.into();
            }
            if let Some(delay_ms) = counter.delay_ms {
                target.critical_section_delay_ms = delay_ms;
            }
        }
    }
}

/// Renders a report either as pretty JSON or as `key: value` lines.
fn render_output<T: serde::Serialize>(report: &T, json: bool) -> RunnerResult<String> {
    let value = serde_json::to_value(report)?;
    if json {
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let Value::Object(fields) = value else {
        return Ok(value.to_string());
    };

    let lines: Vec<String> = fields
        .iter()
        .map(|(key, value)| match value {
            Value::String(text) => format!("{key}: {text}"),
            other => format!("{key}: {other}"),
        })
        .collect();

    Ok(lines.join("\n"))
}

fn print_output(output: &str, print_metrics: bool) {
    println!("{output}");

    if print_metrics && let Some(metrics) = render_metrics() {
        println!("{metrics}");
    }
}
