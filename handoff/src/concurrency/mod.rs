//! Concurrency primitives shared by pipeline workers.
//!
//! - [`channel`]: the bounded FIFO handoff between producers and consumers, with per-item
//!   acknowledgement tracking used for drain detection.
//! - [`counter`]: a lock-guarded integer whose increments are exact under any scheduler.
//! - [`shutdown`]: the one-way signal that tells producers to stop.
//! - [`timer`]: an optional deadline usable as a `tokio::select!` branch.
//!
//! Every primitive works on a current-thread runtime, where tasks only yield at await points, as
//! well as on a multi-threaded runtime, where tasks run in parallel. Locks are never held across
//! an await point.

pub mod channel;
pub mod counter;
pub mod shutdown;
pub mod timer;
