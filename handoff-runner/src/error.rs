use handoff::error::HandoffError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the runner binary.
///
/// Wraps [`HandoffError`] for pipeline and counter failures and adds variants for
/// the runner's own setup and output.
#[derive(Debug)]
pub enum RunnerError {
    /// Pipeline or counter error.
    Handoff(HandoffError),
    /// Configuration error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// Report serialization error.
    Serialization(serde_json::Error, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
}

impl RunnerError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            RunnerError::Handoff(_) => "pipeline error",
            RunnerError::Config(_, _) => "configuration error",
            RunnerError::Serialization(_, _) => "serialization error",
            RunnerError::Io(_, _) => "i/o error",
        }
    }

    /// Returns the backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            RunnerError::Handoff(err) => err.backtrace(),
            RunnerError::Config(_, cb) => Some(&cb.0),
            RunnerError::Serialization(_, cb) => Some(&cb.0),
            RunnerError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        RunnerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("handoff failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {}\n", self));

        // Aggregated errors already list every failure in their display output.
        if !matches!(self, RunnerError::Handoff(err) if err.errors().is_some()) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Handoff(err) => write!(f, "{err}"),
            RunnerError::Config(source, _) => write!(f, "configuration error: {source}"),
            RunnerError::Serialization(source, _) => {
                write!(f, "failed to serialize report: {source}")
            }
            RunnerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for RunnerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunnerError::Handoff(err) => err.source(),
            RunnerError::Config(source, _) => Some(source.as_ref()),
            RunnerError::Serialization(source, _) => Some(source),
            RunnerError::Io(source, _) => Some(source),
        }
    }
}

impl From<HandoffError> for RunnerError {
    fn from(err: HandoffError) -> Self {
        RunnerError::Handoff(err)
    }
}

impl From<serde_json::Error> for RunnerError {
    fn from(err: serde_json::Error) -> Self {
        RunnerError::Serialization(err, CapturedBacktrace::capture())
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(err: std::io::Error) -> Self {
        RunnerError::Io(err, CapturedBacktrace::capture())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff::error::ErrorKind;

    #[test]
    fn report_lists_category_and_causes() {
        let io = std::io::Error::other("disk unplugged");
        let err = RunnerError::config(io);

        let report = err.render_report();

        assert!(report.starts_with("handoff failed\n"));
        assert!(report.contains("category: configuration error\n"));
        assert!(report.contains("cause 1: disk unplugged\n"));
    }

    #[test]
    fn handoff_errors_keep_their_category() {
        let err: RunnerError =
            HandoffError::from((ErrorKind::DrainTimeout, "Drain timed out")).into();

        assert_eq!(err.category(), "pipeline error");
        assert!(err.render_report().contains("Drain timed out"));
    }
}
