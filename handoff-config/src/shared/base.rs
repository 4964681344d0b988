use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The channel must be able to buffer at least one item.
    #[error("`capacity` cannot be zero")]
    CapacityZero,
    /// A pipeline needs at least one producer.
    #[error("`producers` cannot be zero")]
    ProducersZero,
    /// A pipeline needs at least one consumer.
    #[error("`consumers` cannot be zero")]
    ConsumersZero,
    /// The counter workload needs at least one worker.
    #[error("`workers` cannot be zero")]
    WorkersZero,
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
