use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, HandoffResult};

pub const PRODUCER_BEFORE_PUT: &str = "producer.before_put";
pub const CONSUMER_BEFORE_ACK: &str = "consumer.before_ack";

/// Evaluates the failpoint `name`, returning [`ErrorKind::InjectedFailure`] when it is configured
/// with the `return` action.
pub fn handoff_fail_point(name: &str) -> HandoffResult<()> {
    fail_point!(name, |parameter| {
        let detail = match parameter {
            Some(parameter) => format!("The failpoint '{name}' returned an error: {parameter}"),
            None => format!("The failpoint '{name}' returned an error"),
        };

        bail!(
            ErrorKind::InjectedFailure,
            "An error occurred in a fail point",
            detail
        );
    });

    Ok(())
}
