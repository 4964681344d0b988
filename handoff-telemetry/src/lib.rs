//! Logging and metrics setup shared by the handoff binaries and tests.

pub mod metrics;
pub mod tracing;
