use mime::Mime;
use serde_derive::Serialize;

/// A file stored next to the result, `source` is relative to the results directory.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    name: String,
    #[serde(with = "crate::reporter::serialize::display")]
    r#type: Mime,
    source: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, r#type: Mime, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            r#type,
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}
