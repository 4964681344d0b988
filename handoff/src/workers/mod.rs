//! Producer and consumer workers and the pool that supervises them.

pub mod consumer;
pub mod pool;
pub mod producer;
