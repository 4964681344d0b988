//! Metrics definitions for pipeline monitoring.

/// Label for the worker kind in metrics.
pub const WORKER_KIND_LABEL: &str = "worker_kind";

/// Label for the pipeline phase in metrics.
pub const PHASE_LABEL: &str = "phase";

/// Label for the lock strategy in metrics.
pub const LOCK_STRATEGY_LABEL: &str = "lock_strategy";

// Channel metrics

/// Gauge for the number of items currently buffered in the channel.
pub const HANDOFF_CHANNEL_BUFFERED_ITEMS: &str = "handoff_channel_buffered_items";

/// Gauge for the number of items dequeued but not yet acknowledged.
pub const HANDOFF_CHANNEL_IN_FLIGHT_ITEMS: &str = "handoff_channel_in_flight_items";

/// Counter for items put into the channel.
pub const HANDOFF_ITEMS_PRODUCED_TOTAL: &str = "handoff_items_produced_total";

/// Counter for items acknowledged by consumers.
pub const HANDOFF_ITEMS_CONSUMED_TOTAL: &str = "handoff_items_consumed_total";

/// Counter for items that were dequeued and never acknowledged, or discarded on teardown.
pub const HANDOFF_ITEMS_ABANDONED_TOTAL: &str = "handoff_items_abandoned_total";

// Pipeline metrics

/// Counter for pipeline phase transitions.
pub const HANDOFF_PIPELINE_PHASE_TRANSITIONS_TOTAL: &str =
    "handoff_pipeline_phase_transitions_total";

/// Counter for workers that terminated with an error or a panic.
pub const HANDOFF_WORKER_FAILURES_TOTAL: &str = "handoff_worker_failures_total";

/// Histogram for the time items spend between `put` and `ack`.
pub const HANDOFF_ITEM_LATENCY_SECONDS: &str = "handoff_item_latency_seconds";

// Counter metrics

/// Counter for increments applied to a guarded counter.
pub const HANDOFF_COUNTER_INCREMENTS_TOTAL: &str = "handoff_counter_increments_total";
