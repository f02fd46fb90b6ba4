use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde_derive::Serialize;

use super::{
    attachment::Attachment,
    label::Label,
    link::Link,
    parameter::Parameter,
    status::{Status, StatusDetails},
};
use crate::reporter::ReportError;

#[derive(Debug, Serialize, Clone, Builder)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableItem {
    #[builder(setter(into))]
    name: String,
    status: Status,
    #[builder(default)]
    status_details: StatusDetails,
    /// Results are only written once a test is over.
    #[builder(setter(skip), default = "\"finished\"")]
    stage: &'static str,
    #[builder(default = "String::new()", setter(into))]
    description: String,
    #[builder(default = "Vec::new()")]
    attachments: Vec<Attachment>,
    #[builder(default = "Vec::new()")]
    parameters: Vec<Parameter>,
    start: u128,
    stop: u128,
}

impl ExecutableItem {
    pub fn builder() -> ExecutableItemBuilder {
        ExecutableItemBuilder::default()
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

#[derive(Debug, Serialize, Clone, Builder)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(flatten)]
    item: ExecutableItem,
    uuid: uuid::Uuid,
    /// Stable across runs so that reports can follow a test over time.
    #[builder(setter(into))]
    history_id: String,
    #[builder(setter(into))]
    full_name: String,
    #[builder(default = "Vec::new()")]
    labels: Vec<Label>,
    #[builder(default = "Vec::new()")]
    links: Vec<Link>,
}

impl TestResult {
    pub fn builder() -> TestResultBuilder {
        TestResultBuilder::default()
    }

    pub fn file_name(&self) -> String {
        format!("{}-result.json", self.uuid.simple())
    }

    pub fn save_into_dir(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;
        let path = dir.join(self.file_name());
        let file = File::create(&path).map_err(|e| ReportError::io(&path, e))?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(path)
    }

    pub fn uuid(&self) -> uuid::Uuid {
        self.uuid
    }

    pub fn item(&self) -> &ExecutableItem {
        &self.item
    }
}
