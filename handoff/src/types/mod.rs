//! Common types used throughout the pipeline.
//!
//! Re-exports the item envelope that travels through channels and the identifiers used to
//! attribute work and failures to individual workers.

mod item;
mod serialization;
mod worker;

pub use item::*;
pub(crate) use serialization::serialize_millis;
pub use worker::*;
