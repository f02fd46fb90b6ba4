use crate::app::test::Test;
use derivative::Derivative;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod allure;
pub mod serialize;
pub mod summary;
pub mod xunit;

pub use summary::Summary;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not write report {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not serialize report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not build junit report: {0}")]
    Junit(String),
}

impl ReportError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ReportError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Receives every test once its final result is known.
pub trait Reporter {
    fn after_test(&mut self, test: &Test);

    /// Writes whatever was collected.
    fn final_report(&mut self) -> Result<(), ReportError>;
}

/// Fans results out to several reporters while keeping the run counters.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct CompositeReporter {
    summary: Summary,
    #[derivative(Debug = "ignore")]
    reporters: Vec<Box<dyn Reporter>>,
}

impl CompositeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reporter: impl Reporter + 'static) {
        self.reporters.push(Box::new(reporter));
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }
}

impl Reporter for CompositeReporter {
    fn after_test(&mut self, test: &Test) {
        self.summary.record(test);
        for reporter in self.reporters.iter_mut() {
            reporter.after_test(test);
        }
    }

    /// Every reporter gets its chance, the first failure is returned.
    fn final_report(&mut self) -> Result<(), ReportError> {
        let mut first_error = None;
        for reporter in self.reporters.iter_mut() {
            if let Err(err) = reporter.final_report() {
                error!("{}", err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
