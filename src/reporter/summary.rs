use crate::app::result::ResultState;
use crate::app::test::Test;
use std::time::Duration;

/// Counters of a whole launcher run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub timeout: usize,
    pub known_error: usize,
    pub not_run: usize,
    /// Tests that only passed once retried.
    pub flaky: usize,
    pub time: Duration,
}

impl Summary {
    pub fn record(&mut self, test: &Test) {
        match test.result() {
            ResultState::Passed => self.passed += 1,
            ResultState::Failed => self.failed += 1,
            ResultState::Timeout => self.timeout += 1,
            ResultState::KnownError => self.known_error += 1,
            ResultState::NotRun => self.not_run += 1,
        }
        if test.is_flaky() {
            self.flaky += 1;
        }
        self.time += test.time_taken();
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.timeout + self.known_error + self.not_run
    }

    /// No test failed nor timed out.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.timeout == 0
    }
}
