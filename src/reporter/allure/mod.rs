use crate::app::result::ResultState;
use crate::app::test::Test;
use crate::reporter::{ReportError, Reporter};
use crate::time::epoch_millis;
use std::fs;
use std::path::{Path, PathBuf};

pub mod model;

use model::{Attachment, ExecutableItem, Label, Link, Parameter, Status, StatusDetails, TestResult};

const FRAMEWORK: &str = "gst-validate";

/// A log file to copy next to the result it is attached to.
#[derive(Debug, Clone)]
struct PendingAttachment {
    from: PathBuf,
    source: String,
}

/// Writes one allure result file per test, logs attached.
#[derive(Debug)]
pub struct AllureReporter {
    dir: PathBuf,
    host: String,
    pending: Vec<(TestResult, Vec<PendingAttachment>)>,
}

impl AllureReporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_owned());
        Self {
            dir: dir.into(),
            host,
            pending: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn attachments(test: &Test, uuid: uuid::Uuid) -> Vec<PendingAttachment> {
        test.logfile()
            .into_iter()
            .chain(test.extra_logfiles().iter().map(PathBuf::as_path))
            .filter(|path| path.exists())
            .enumerate()
            .map(|(index, path)| PendingAttachment {
                from: path.to_path_buf(),
                source: format!("{}-{}-attachment.txt", uuid.simple(), index),
            })
            .collect()
    }

    fn convert(&self, test: &Test) -> Result<(TestResult, Vec<PendingAttachment>), String> {
        let uuid = test.uuid().unwrap_or_else(uuid::Uuid::new_v4);
        let pending = Self::attachments(test, uuid);
        let attachments = pending
            .iter()
            .map(|attachment| {
                let name = attachment
                    .from
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Attachment::new(name, mime::TEXT_PLAIN, attachment.source.clone())
            })
            .collect();

        let mut parameters = vec![Parameter::new("timeout", test.timeout().as_secs())];
        if let Some(scenario) = test.scenario() {
            parameters.push(Parameter::new("scenario", scenario.name()));
        }
        if let Some(media) = test.media() {
            parameters.push(Parameter::new("uri", media.uri()).excluded());
        }

        let start = test.started_at().map(epoch_millis).unwrap_or_default();
        let details = StatusDetails::from(test.message().to_owned())
            .known(test.result() == ResultState::KnownError)
            .flaky(test.is_flaky())
            .trace(test.command_line());
        let item = ExecutableItem::builder()
            .name(test.name())
            .status(Status::from(test.result()))
            .status_details(details)
            .description(test.command_line().unwrap_or_default())
            .attachments(attachments)
            .parameters(parameters)
            .start(start)
            .stop(start + test.time_taken().as_millis())
            .build()?;

        let testsuite = test.classname().split('.').next().unwrap_or_default();
        let links = test
            .known_issues()
            .iter()
            .filter_map(|issue| issue.bug.as_deref())
            .map(Link::issue)
            .collect();
        let result = TestResult::builder()
            .item(item)
            .uuid(uuid)
            .history_id(test.classname())
            .full_name(test.classname())
            .labels(vec![
                Label::ParentSuite(testsuite.to_owned()),
                Label::Suite(test.suite_classname().to_owned()),
                Label::Host(self.host.clone()),
                Label::Framework(FRAMEWORK.to_owned()),
            ])
            .links(links)
            .build()?;
        Ok((result, pending))
    }
}

impl Reporter for AllureReporter {
    fn after_test(&mut self, test: &Test) {
        match self.convert(test) {
            Ok(converted) => self.pending.push(converted),
            Err(err) => warn!("Could not build allure result of {}: {}", test.classname(), err),
        }
    }

    fn final_report(&mut self) -> Result<(), ReportError> {
        fs::create_dir_all(&self.dir).map_err(|e| ReportError::io(&self.dir, e))?;
        for (result, attachments) in self.pending.drain(..) {
            for attachment in attachments {
                let target = self.dir.join(&attachment.source);
                fs::copy(&attachment.from, &target)
                    .map_err(|e| ReportError::io(&attachment.from, e))?;
            }
            let path = result.save_into_dir(&self.dir)?;
            trace!("Allure result written to {}", path.display());
        }
        info!("Allure results written to {}", self.dir.display());
        Ok(())
    }
}
