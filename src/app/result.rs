use serde_derive::Serialize;
use std::fmt;

/// Outcome of a test run.
///
/// A test starts as `NotRun` and a completed run leaves it in exactly one
/// of the other states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultState {
    NotRun,
    Passed,
    Failed,
    Timeout,
    KnownError,
}

impl Default for ResultState {
    fn default() -> Self {
        ResultState::NotRun
    }
}

impl ResultState {
    /// Passed, or failed in a way that is already known about.
    pub fn is_success(self) -> bool {
        matches!(self, ResultState::Passed | ResultState::KnownError)
    }

    pub fn is_terminal(self) -> bool {
        self != ResultState::NotRun
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ResultState::NotRun => "Not run",
            ResultState::Passed => "Passed",
            ResultState::Failed => "Failed",
            ResultState::Timeout => "Timeout",
            ResultState::KnownError => "Known error",
        };
        f.write_str(text)
    }
}
