use config::{Config, ConfigError, File};
use regex::Regex;
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Testsuite description loaded at startup.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Manifest {
    /// General scenarios crossed with every media, `none` meaning plain playback.
    pub scenarios: Vec<String>,
    pub media_paths: Vec<PathBuf>,
    #[serde(with = "crate::configuration::deserialize::duration_opt")]
    pub long_limit: Option<Duration>,
    #[serde(with = "crate::configuration::deserialize::duration_opt")]
    pub timeout: Option<Duration>,
    pub blacklist: Vec<BlacklistEntry>,
    pub known_issues: Vec<KnownIssue>,
    pub pipelines: Vec<PipelineEntry>,
    pub encoding_formats: Vec<EncodingFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlacklistEntry {
    #[serde(with = "serde_regex")]
    pub pattern: Regex,
    #[serde(default)]
    pub reason: String,
}

/// Failures that are known to happen on some tests and should not fail the run.
#[derive(Debug, Clone, Deserialize)]
pub struct KnownIssue {
    #[serde(with = "serde_regex")]
    pub tests: Vec<Regex>,
    #[serde(default)]
    pub returncodes: Vec<i32>,
    #[serde(default, deserialize_with = "crate::configuration::deserialize::flag::deserialize")]
    pub timeout: bool,
    /// The issue is flaky, not seeing it is not an error.
    #[serde(default, deserialize_with = "crate::configuration::deserialize::flag::deserialize")]
    pub sometimes: bool,
    #[serde(default)]
    pub bug: Option<String>,
}

impl KnownIssue {
    pub fn applies_to(&self, classname: &str) -> bool {
        self.tests.iter().any(|regex| regex.is_match(classname))
    }

    pub fn describe(&self) -> String {
        match &self.bug {
            Some(bug) => format!("known issue {}", bug),
            None => "known issue".to_owned(),
        }
    }
}

/// A launch line run through the validation tool, optionally described by fake media info.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineEntry {
    pub name: String,
    pub pipeline: String,
    #[serde(default)]
    pub scenarios: Vec<String>,
    #[serde(default)]
    pub media: Option<FakeMediaInfo>,
    #[serde(default, with = "crate::configuration::deserialize::duration_opt")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Static description of what a launch line produces, used for scenario compatibility.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FakeMediaInfo {
    pub uri: String,
    #[serde(with = "crate::configuration::deserialize::duration")]
    pub duration: Duration,
    pub protocol: Option<String>,
    #[serde(deserialize_with = "crate::configuration::deserialize::flag::deserialize")]
    pub seekable: bool,
    #[serde(deserialize_with = "crate::configuration::deserialize::flag::deserialize")]
    pub live: bool,
    #[serde(deserialize_with = "crate::configuration::deserialize::flag::deserialize")]
    pub image: bool,
    pub tracks: Vec<String>,
}

impl Default for FakeMediaInfo {
    fn default() -> Self {
        Self {
            uri: String::new(),
            duration: Duration::default(),
            protocol: None,
            seekable: true,
            live: false,
            image: false,
            tracks: Vec::new(),
        }
    }
}

/// Output format of a transcoding test.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EncodingFormat {
    pub container: String,
    pub audio: String,
    pub video: String,
}

impl fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.audio, self.video, self.container)
    }
}

impl Manifest {
    pub fn load(file: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::new();
        config.merge(File::from(file))?;
        config.try_into()
    }
}
