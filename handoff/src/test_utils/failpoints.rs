use fail::FailScenario;

/// Failpoint configuration that is reset when dropped.
///
/// Tests using failpoints share process-wide state, so they must not run concurrently with other
/// failpoint tests.
pub struct HandoffFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> HandoffFailScenario<'a> {
    /// Configures each `(failpoint, action)` pair, for example `("consumer.before_ack", "1*return")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> HandoffFailScenario<'a> {
        let scenario = FailScenario::setup();

        for (failpoint, action) in failpoints {
            fail::cfg(*failpoint, action).unwrap();
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(failpoint, _)| failpoint.to_string())
                .collect(),
        }
    }
}

impl Drop for HandoffFailScenario<'_> {
    fn drop(&mut self) {
        for failpoint in &self.failpoints {
            fail::remove(failpoint);
        }
    }
}
