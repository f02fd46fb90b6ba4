use crate::app::result::ResultState;
use serde_derive::Serialize;

#[derive(Debug, Serialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    known: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    flaky: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<String>,
}

impl StatusDetails {
    pub fn known(mut self, known: bool) -> Self {
        self.known = known;
        self
    }

    pub fn flaky(mut self, flaky: bool) -> Self {
        self.flaky = flaky;
        self
    }

    pub fn trace(mut self, trace: Option<String>) -> Self {
        self.trace = trace;
        self
    }
}

impl From<String> for StatusDetails {
    fn from(message: String) -> Self {
        Self {
            message,
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Failed,
    Broken,
    Passed,
    Skipped,
}

impl From<ResultState> for Status {
    fn from(result: ResultState) -> Self {
        match result {
            ResultState::Passed | ResultState::KnownError => Status::Passed,
            ResultState::Failed => Status::Failed,
            ResultState::Timeout => Status::Broken,
            ResultState::NotRun => Status::Skipped,
        }
    }
}
