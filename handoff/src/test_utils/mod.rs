//! Utilities for testing pipelines, channels and counters.
//!
//! - [`source`]: deterministic item sources.
//! - [`processor`]: processors that record what they consume or fail on purpose.
//! - [`pipeline`]: a builder for pipeline configurations used in tests.
//! - [`counter`]: an unguarded counter used as a negative control for lock-free updates.
//! - [`notify`]: timeouts that make a stuck test fail instead of hanging.
//! - [`failpoints`]: scoped failpoint configuration, with the `failpoints` feature.

pub mod counter;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod notify;
pub mod pipeline;
pub mod processor;
pub mod source;
