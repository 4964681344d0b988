use serde::Serializer;
use std::time::Duration;

/// Serializes a [`Duration`] as whole milliseconds.
pub(crate) fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}
