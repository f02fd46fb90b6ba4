use serde_derive::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    name: String,
    value: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    excluded: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
            excluded: false,
        }
    }

    /// Not taken into account when computing the history of the test.
    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }
}
