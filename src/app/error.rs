use crate::reporter::ReportError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Harness level errors.
///
/// Anything a single test does wrong is turned into a
/// [`ResultState`](crate::app::result::ResultState) instead; only
/// [`Error::Interrupted`] and [`Error::Unkillable`] ever leave a test run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} not found in PATH")]
    MissingBinary(String),
    #[error("scenario discovery failed: {0}")]
    ScenarioDiscovery(String),
    #[error("invalid media info {}: {reason}", path.display())]
    MediaInfo { path: PathBuf, reason: String },
    #[error("could not parse {}: {reason}", path.display())]
    Xml { path: PathBuf, reason: String },
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid test pattern: {0}")]
    Regex(#[from] regex::Error),
    #[error("invalid test definition: {0}")]
    Builder(String),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("interrupted by operator")]
    Interrupted,
    #[error("could not kill subprocess {pid} after {} seconds, something is really wrong", ceiling.as_secs())]
    Unkillable { pid: u32, ceiling: Duration },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
