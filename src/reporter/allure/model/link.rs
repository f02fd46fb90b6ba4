use serde_derive::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    name: String,
    url: String,
    r#type: LinkType,
}

impl Link {
    /// Link to a bug tracker entry, `bug` may be a plain reference or an url.
    pub fn issue(bug: &str) -> Self {
        Self {
            name: bug.to_owned(),
            url: bug.to_owned(),
            r#type: LinkType::Issue,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum LinkType {
    Issue,
}
