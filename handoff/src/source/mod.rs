//! Item sources feeding pipeline producers.
//!
//! Producers ask their [`ItemSource`] for one payload at a time and put it into the channel.

mod base;
pub mod random;

pub use base::{ItemSource, ProductionQuota};
