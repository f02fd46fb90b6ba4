use crate::configuration::constants::cargo_env::{CARGO_PKG_NAME, CARGO_PKG_VERSION};
use crate::configuration::constants::common::DEFAULT_LOGS_DIR;
use crate::time::timeunit::parse_duration;
use clap::arg_enum;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

arg_enum! {
    #[derive(Debug, Clone, Copy)]
    pub enum LogLevel {
        Off, Error, Warn, Info, Debug, Trace,
    }
}

arg_enum! {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum RedirectLogs {
        Stdout, Stderr,
    }
}

#[derive(StructOpt, Debug, Default)]
#[structopt(name = CARGO_PKG_NAME, version = CARGO_PKG_VERSION)]
pub struct Opt {
    /// Launcher manifest describing the testsuite. Supported: TOML, YAML, JSON, INI
    #[structopt(parse(from_os_str))]
    pub file: Option<PathBuf>,

    /// Sets a logging level
    #[structopt(case_insensitive = true, long, short = "L", possible_values = &LogLevel::variants(), env = "LOG_LEVEL")]
    pub logging: Option<LogLevel>,

    /// File to which application will write logs
    #[structopt(long, short = "O", env = "LOG_OUTPUT_FILE")]
    pub log_output_file: Option<PathBuf>,

    /// Regexes (comma separated) of the tests to run, anything else is left out
    #[structopt(long, short = "t")]
    pub wanted_tests: Vec<String>,

    /// Regexes (comma separated) of the tests not to run
    #[structopt(long, short = "b")]
    pub blacklisted_tests: Vec<String>,

    /// Tests declaring a longer duration are not run unless explicitly wanted
    #[structopt(long, parse(try_from_str = parse_duration))]
    pub long_limit: Option<Duration>,

    /// Multiplies every test timeout
    #[structopt(long, default_value = "1.0")]
    pub timeout_factor: f64,

    /// Do not apply the absolute per test timeout
    #[structopt(long)]
    pub no_hard_timeout: bool,

    /// Stop the whole run at the first failing test
    #[structopt(long)]
    pub fatal_error: bool,

    /// Run failing tests once more to detect flakiness
    #[structopt(long)]
    pub retry_on_failures: bool,

    /// Directory where the test logs are written
    #[structopt(long, parse(from_os_str), default_value = DEFAULT_LOGS_DIR)]
    pub logsdir: PathBuf,

    /// Write an xUnit XML report to this file
    #[structopt(long, parse(from_os_str))]
    pub xunit_file: Option<PathBuf>,

    /// Write allure results into this directory
    #[structopt(long, parse(from_os_str))]
    pub allure_dir: Option<PathBuf>,

    /// Send the tests output to the launcher stdout or stderr instead of log files
    #[structopt(long, case_insensitive = true, possible_values = &RedirectLogs::variants())]
    pub redirect_logs: Option<RedirectLogs>,

    /// Do not colorize the output
    #[structopt(long)]
    pub no_color: bool,

    /// List the tests that would run and exit
    #[structopt(long, short = "l")]
    pub list_tests: bool,

    /// Only use these test managers
    #[structopt(long)]
    pub testers: Vec<String>,

    /// Directories scanned for media files and their media info
    #[structopt(long, short = "M", parse(from_os_str))]
    pub media_paths: Vec<PathBuf>,

    /// Regenerate the media info files of every scanned media
    #[structopt(long)]
    pub update_media_info: bool,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Splits repeated, comma separated pattern options into single patterns.
pub fn split_patterns(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let opt = Opt::from_iter(vec![
            "validate-launcher",
            "suite.toml",
            "-t",
            "validate.file.*,validate.http.*",
            "--long-limit",
            "10m",
            "--redirect-logs",
            "stderr",
            "--fatal-error",
        ]);
        assert_eq!(opt.file, Some(PathBuf::from("suite.toml")));
        assert_eq!(opt.long_limit, Some(Duration::from_secs(600)));
        assert_eq!(opt.redirect_logs, Some(RedirectLogs::Stderr));
        assert!(opt.fatal_error);
        assert_eq!(opt.timeout_factor, 1.0);
        assert_eq!(opt.logsdir, PathBuf::from("launcher-logs"));
        assert_eq!(
            split_patterns(&opt.wanted_tests),
            vec!["validate.file.*".to_owned(), "validate.http.*".to_owned()]
        );
    }
}
