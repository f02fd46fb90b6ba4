use crate::app::result::ResultState;
use crate::app::test::Test;
use crate::reporter::{ReportError, Reporter};
use chrono::{DateTime, Local};
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

const REPORT_NAME: &str = "validate-launcher";

/// Collects results into an xUnit XML file written at the end of the run.
#[derive(Debug)]
pub struct XunitReporter {
    path: PathBuf,
    suites: BTreeMap<String, TestSuite>,
    started: SystemTime,
    clock: Instant,
}

impl XunitReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            suites: BTreeMap::new(),
            started: SystemTime::now(),
            clock: Instant::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn status(test: &Test) -> TestCaseStatus {
        match test.result() {
            ResultState::Passed | ResultState::KnownError => TestCaseStatus::success(),
            ResultState::NotRun => {
                let mut status = TestCaseStatus::skipped();
                status.set_message(test.message());
                status
            }
            ResultState::Failed => {
                let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
                status.set_message(test.message());
                status
            }
            ResultState::Timeout => {
                let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
                status.set_message(test.message()).set_type("timeout");
                status
            }
        }
    }

    fn testcase(test: &Test) -> TestCase {
        let mut testcase = TestCase::new(test.name(), Self::status(test));
        testcase
            .set_classname(test.suite_classname())
            .set_time(test.time_taken());
        if let Some(started) = test.started_at() {
            testcase.set_timestamp(DateTime::<Local>::from(started));
        }
        if test.result() == ResultState::KnownError {
            testcase.set_system_err(test.message());
        }
        if let Some(logfile) = test.logfile() {
            match fs::read(logfile) {
                Ok(content) => {
                    testcase.set_system_out(String::from_utf8_lossy(&content));
                }
                Err(err) => debug!("Could not read {}: {}", logfile.display(), err),
            }
        }
        testcase
    }
}

impl Reporter for XunitReporter {
    fn after_test(&mut self, test: &Test) {
        let suite = test
            .classname()
            .split('.')
            .next()
            .unwrap_or_default()
            .to_owned();
        self.suites
            .entry(suite.clone())
            .or_insert_with(|| TestSuite::new(suite))
            .add_test_case(Self::testcase(test));
    }

    fn final_report(&mut self) -> Result<(), ReportError> {
        let mut report = Report::new(REPORT_NAME);
        report
            .set_timestamp(DateTime::<Local>::from(self.started))
            .set_time(self.clock.elapsed())
            .add_test_suites(std::mem::take(&mut self.suites).into_values());

        let xml = report
            .to_string()
            .map_err(|err| ReportError::Junit(err.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;
        }
        fs::write(&self.path, xml).map_err(|e| ReportError::io(&self.path, e))?;
        info!("XUnit report written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(classname: &str, result: ResultState, message: &str) -> Test {
        let mut test = Test::builder()
            .application("true")
            .classname(classname)
            .build()
            .unwrap();
        test.set_result(result, message, "");
        test
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("xunit.xml");
        let mut reporter = XunitReporter::new(&path);
        reporter.after_test(&finished("validate.file.playback.play_15s.a", ResultState::Passed, ""));
        reporter.after_test(&finished(
            "validate.file.playback.seek.a",
            ResultState::Timeout,
            "Application timed out: 30 secs",
        ));
        reporter.after_test(&finished(
            "validate.file.playback.seek.b",
            ResultState::Failed,
            "Application returned 1",
        ));
        reporter.after_test(&finished(
            "validate.file.playback.seek.c",
            ResultState::KnownError,
            "Application returned 1 (known issue #42)",
        ));
        reporter.final_report().unwrap();

        let xml = fs::read_to_string(&path).unwrap();
        assert!(xml.contains("<testsuite name=\"validate\""));
        assert!(xml.contains("classname=\"validate.file.playback.seek\""));
        assert!(xml.contains("name=\"play_15s\""));
        assert!(xml.contains("type=\"timeout\""));
        assert!(xml.contains("Application returned 1"));
        assert!(xml.contains("known issue #42"));
        assert_eq!(xml.matches("<failure").count(), 2);
    }

    #[test]
    fn test_redirected_test_has_no_output() {
        let test = finished("validate.launch_pipeline.a.none", ResultState::Passed, "");
        assert!(test.logfile().is_none());
        let testcase = XunitReporter::testcase(&test);
        assert!(testcase.system_out.is_none());
    }
}
