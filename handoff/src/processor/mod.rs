//! Item processors run by pipeline consumers.

mod base;
pub mod logging;

pub use base::ItemProcessor;
