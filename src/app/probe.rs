use crate::configuration::constants::common::NANOS_PER_SECOND;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static! {
    static ref POSITION_REGEX: Regex = Regex::new(
        r"<position: (?P<position>\d+:\d{2}:\d{2}\.\d+) duration: (?P<duration>\d+:\d{2}:\d{2}\.\d+)"
    )
    .expect("valid position regex");
}

/// One progress sample of a running test.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Nothing to measure, fall back to a wall clock timeout.
    NotRun,
    Failed(String),
    KnownError(String),
    Value(i64),
}

/// What a probe may look at while the test runs.
#[derive(Debug, Clone, Copy)]
pub struct ProbeContext<'a> {
    pub logfile: Option<&'a Path>,
    pub extra_logfiles: &'a [PathBuf],
    pub elapsed: Duration,
}

/// Measures progress of a running test; a value that stops changing for
/// longer than the test timeout means the test is stuck.
pub trait ProgressProbe: fmt::Debug + Send {
    fn sample(&mut self, ctx: &ProbeContext<'_>) -> Progress;

    /// Forget what was seen during a previous run.
    fn reset(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressProbe for NoProgress {
    fn sample(&mut self, _ctx: &ProbeContext<'_>) -> Progress {
        Progress::NotRun
    }
}

/// `H:MM:SS.NNNNNNNNN` to nanoseconds.
pub fn parse_clock_time(text: &str) -> Option<i64> {
    let (clock, fraction) = text.trim().split_once('.')?;
    let mut parts = clock.splitn(3, ':').map(|part| part.parse::<i64>().ok());
    let hours = parts.next()??;
    let minutes = parts.next()??;
    let seconds = parts.next()??;
    let mut digits: String = fraction.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    let nanos = digits.parse::<i64>().ok()?;
    Some((hours * 3600 + minutes * 60 + seconds) * NANOS_PER_SECOND + nanos)
}

/// Last `(position, duration)` pair printed in `text`.
pub fn last_position(text: &str) -> Option<(i64, i64)> {
    POSITION_REGEX.captures_iter(text).last().and_then(|caps| {
        let position = parse_clock_time(&caps["position"])?;
        let duration = parse_clock_time(&caps["duration"])?;
        Some((position, duration))
    })
}

/// Follows the position markers the validation tool prints while playing.
#[derive(Debug, Default)]
pub struct PositionProbe {
    offset: u64,
    pending: String,
    position: Option<i64>,
}

impl PositionProbe {
    fn read_new_output(&mut self, logfile: &Path) {
        let mut file = match File::open(logfile) {
            Ok(file) => file,
            Err(_) => return,
        };
        if file.seek(SeekFrom::Start(self.offset)).is_err() {
            return;
        }
        let mut chunk = Vec::new();
        if let Ok(read) = file.read_to_end(&mut chunk) {
            self.offset += read as u64;
        }
        self.pending.push_str(&String::from_utf8_lossy(&chunk));

        if let Some((position, _)) = last_position(&self.pending) {
            self.position = Some(position);
        }
        // markers may be split across reads, keep the unfinished line
        match self.pending.rfind(|c| c == '\n' || c == '\r') {
            Some(index) => {
                self.pending.drain(..=index);
            }
            None if self.pending.len() > 4096 => self.pending.clear(),
            None => {}
        }
    }
}

impl ProgressProbe for PositionProbe {
    fn sample(&mut self, ctx: &ProbeContext<'_>) -> Progress {
        if let Some(logfile) = ctx.logfile {
            self.read_new_output(logfile);
        }
        match self.position {
            Some(position) => Progress::Value(position),
            None => Progress::NotRun,
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Size of a file being produced by the test.
#[derive(Debug, Clone)]
pub struct FileSizeProbe {
    path: PathBuf,
}

impl FileSizeProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProgressProbe for FileSizeProbe {
    fn sample(&mut self, _ctx: &ProbeContext<'_>) -> Progress {
        match self.path.metadata() {
            Ok(meta) => {
                trace!("Size: {}", meta.len());
                Progress::Value(meta.len() as i64)
            }
            Err(_) => Progress::NotRun,
        }
    }
}
