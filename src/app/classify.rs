use crate::app::media::{path_to_uri, MediaDescriptor, Protocol, TrackType, ValidateMediaDescriptor};
use crate::app::probe::last_position;
use crate::app::result::ResultState;
use crate::configuration::constants::common::{
    ENCODED_DURATION_TOLERANCE, HLS_EOS_TOLERANCE, VALGRIND_ERROR_CODE,
};
use crate::configuration::manifest::KnownIssue;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref FAULT_SIGNAL_REGEX: Regex =
        Regex::new(r"<Caught SIGNAL: [^>]*>").expect("valid signal regex");
    static ref CRITICAL_REGEX: Regex =
        Regex::new(r"(?m)^\s*critical\s*:\s*(?P<summary>.*?)\s*$").expect("valid critical regex");
    static ref CAPS_NOISE_REGEX: Regex = Regex::new(r"\(.+?\)\s*| |;").expect("valid caps regex");
}

#[cfg(unix)]
const FATAL_SIGNALS: &[(i32, &str)] = &[
    (libc::SIGQUIT, "SIGQUIT"),
    (libc::SIGILL, "SIGILL"),
    (libc::SIGABRT, "SIGABRT"),
    (libc::SIGFPE, "SIGFPE"),
    (libc::SIGSEGV, "SIGSEGV"),
    (libc::SIGBUS, "SIGBUS"),
    (libc::SIGSYS, "SIGSYS"),
    (libc::SIGTRAP, "SIGTRAP"),
    (libc::SIGXCPU, "SIGXCPU"),
    (libc::SIGXFSZ, "SIGXFSZ"),
];

#[cfg(not(unix))]
const FATAL_SIGNALS: &[(i32, &str)] = &[
    (4, "SIGILL"),
    (8, "SIGFPE"),
    (11, "SIGSEGV"),
    (22, "SIGABRT"),
];

/// Name of the fatal signal an exit code stands for, either a negated
/// signal number or a shell style `128 + n`.
pub fn fatal_signal(code: i32) -> Option<&'static str> {
    FATAL_SIGNALS
        .iter()
        .find(|(signal, _)| code == -signal || code == 128 + signal)
        .map(|(_, name)| *name)
}

/// How the supervision loop left a test.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// `NotRun` when the process exited on its own.
    pub result: ResultState,
    pub message: String,
    pub returncode: Option<i32>,
}

pub struct ClassifyContext<'a> {
    pub logfile: Option<&'a Path>,
    pub extra_logfiles: &'a [PathBuf],
    /// Known issues applying to the test.
    pub known_issues: &'a [KnownIssue],
    pub media: Option<&'a dyn MediaDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub result: ResultState,
    pub message: String,
}

impl Verdict {
    pub fn new(result: ResultState, message: impl Into<String>) -> Self {
        Self {
            result,
            message: message.into(),
        }
    }
}

/// Turns the end of a run into the final result of a test.
pub trait ResultClassifier: fmt::Debug + Send {
    fn classify(&self, outcome: &Outcome, ctx: &ClassifyContext<'_>) -> Verdict;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExitCodeClassifier;

impl ResultClassifier for ExitCodeClassifier {
    fn classify(&self, outcome: &Outcome, ctx: &ClassifyContext<'_>) -> Verdict {
        match outcome.result {
            ResultState::Timeout | ResultState::Failed | ResultState::KnownError => {
                return Verdict::new(outcome.result, outcome.message.clone());
            }
            _ => {}
        }
        let code = match outcome.returncode {
            Some(code) => code,
            None => return Verdict::new(ResultState::Failed, "Application did not exit"),
        };

        if code == 0 {
            let missing = ctx.known_issues.iter().find_map(|issue| {
                issue
                    .returncodes
                    .iter()
                    .find(|expected| **expected != 0 && !issue.sometimes)
            });
            return match missing {
                Some(expected) => {
                    Verdict::new(ResultState::Failed, format!("Expected return code {}", expected))
                }
                None => Verdict::new(ResultState::Passed, ""),
            };
        }
        if let Some(signal) = fatal_signal(code) {
            return Verdict::new(
                ResultState::Failed,
                format!("Application exited with signal {}", signal),
            );
        }
        if code == VALGRIND_ERROR_CODE {
            return Verdict::new(ResultState::Failed, "Valgrind reported errors");
        }
        if let Some(issue) = ctx
            .known_issues
            .iter()
            .find(|issue| issue.returncodes.contains(&code))
        {
            return Verdict::new(
                ResultState::KnownError,
                format!("Application returned {} ({})", code, issue.describe()),
            );
        }
        Verdict::new(ResultState::Failed, format!("Application returned {}", code))
    }
}

/// Also looks at what the validation tool logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateLogClassifier {
    exit_code: ExitCodeClassifier,
}

impl ValidateLogClassifier {
    fn classify_timeout(&self, outcome: &Outcome, ctx: &ClassifyContext<'_>, log: &str) -> Verdict {
        if let Some(fault) = FAULT_SIGNAL_REGEX.find(log) {
            return Verdict::new(ResultState::Failed, fault.as_str());
        }
        if let Some(issue) = ctx.known_issues.iter().find(|issue| issue.timeout) {
            return Verdict::new(
                ResultState::KnownError,
                format!("Expected timeout happened ({})", issue.describe()),
            );
        }
        let is_hls = ctx
            .media
            .map(|media| media.protocol() == Protocol::Hls)
            .unwrap_or(false);
        if is_hls {
            if let Some((position, duration)) = last_position(log) {
                let remaining = duration.saturating_sub(position);
                if duration > 0 && remaining >= 0 && (remaining as u128) < HLS_EOS_TOLERANCE.as_nanos() {
                    return Verdict::new(
                        ResultState::KnownError,
                        format!("{} (HLS stalled close to the end of the stream)", outcome.message),
                    );
                }
            }
        }
        Verdict::new(ResultState::Timeout, outcome.message.clone())
    }
}

fn criticals(extra_logfiles: &[PathBuf]) -> BTreeSet<String> {
    extra_logfiles
        .iter()
        .filter(|path| path.to_string_lossy().ends_with(".validate.log"))
        .filter_map(|path| fs::read_to_string(path).ok())
        .flat_map(|text| {
            CRITICAL_REGEX
                .captures_iter(&text)
                .map(|caps| caps["summary"].to_owned())
                .collect::<Vec<_>>()
        })
        .filter(|summary| !summary.is_empty())
        .collect()
}

impl ResultClassifier for ValidateLogClassifier {
    fn classify(&self, outcome: &Outcome, ctx: &ClassifyContext<'_>) -> Verdict {
        let log = ctx
            .logfile
            .and_then(|path| fs::read_to_string(path).ok())
            .unwrap_or_default();

        let mut verdict = if outcome.result == ResultState::Timeout {
            self.classify_timeout(outcome, ctx, &log)
        } else {
            self.exit_code.classify(outcome, ctx)
        };
        if verdict.result == ResultState::Timeout {
            return verdict;
        }

        let criticals = criticals(ctx.extra_logfiles);
        if !criticals.is_empty() {
            if !verdict.message.is_empty() {
                verdict.message.push(' ');
            }
            verdict.message.push_str(&format!(
                "(critical errors: [{}])",
                criticals.into_iter().collect::<Vec<_>>().join(", ")
            ));
            verdict.result = ResultState::Failed;
        }
        verdict
    }
}

/// Caps an encoding profile asks for, one entry per stream kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedCaps {
    pub container: String,
    pub video: Option<String>,
    pub audio: Option<String>,
}

impl ExpectedCaps {
    fn for_track(&self, track_type: TrackType) -> Option<&str> {
        match track_type {
            TrackType::Video | TrackType::Image => self.video.as_deref(),
            TrackType::Audio => self.audio.as_deref(),
            TrackType::Subtitle | TrackType::Other => None,
        }
    }
}

/// `key=value` fields and structure name of `caps`, without field types.
fn caps_fields(caps: &str) -> Vec<String> {
    CAPS_NOISE_REGEX
        .replace_all(caps, "")
        .split(',')
        .filter(|field| !field.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `application/ogg`, `video/ogg` and `audio/ogg` name the same container.
fn has_type_variant(wanted: &str, fields: &[String]) -> bool {
    match wanted.split_once('/') {
        Some((media_type, subtype)) if ["application", "video", "audio"].contains(&media_type) => {
            fields.iter().any(|field| match field.split_once('/') {
                Some((_, other)) => other == subtype,
                None => false,
            })
        }
        _ => false,
    }
}

/// Checks the file a transcoding test produced once the tool exited happily:
/// it must be discoverable, last as long as its source and carry the
/// requested streams.
#[derive(Debug, Clone)]
pub struct EncodedFileClassifier {
    output: PathBuf,
    media_check: PathBuf,
    expected: ExpectedCaps,
    log: ValidateLogClassifier,
}

impl EncodedFileClassifier {
    pub fn new(output: impl Into<PathBuf>, media_check: impl Into<PathBuf>, expected: ExpectedCaps) -> Self {
        Self {
            output: output.into(),
            media_check: media_check.into(),
            expected,
            log: ValidateLogClassifier::default(),
        }
    }

    fn sidecar(&self) -> PathBuf {
        let mut name = self.output.clone().into_os_string();
        name.push(".media_info");
        PathBuf::from(name)
    }

    fn check_output(&self, source: Option<&dyn MediaDescriptor>) -> Result<(), String> {
        let sidecar = self.sidecar();
        let discovered = ValidateMediaDescriptor::generate(
            &path_to_uri(&self.output),
            &self.media_check,
            &sidecar,
            false,
        );
        if let Err(err) = fs::remove_file(&sidecar) {
            trace!("No media info to remove at {}: {}", sidecar.display(), err);
        }
        let discovered = discovered.map_err(|err| {
            format!("Could not discover encoded file {}: {}", self.output.display(), err)
        })?;

        if let Some(source) = source.filter(|source| source.duration() > 0) {
            let duration = discovered.duration();
            let drift = duration.max(source.duration()) - duration.min(source.duration());
            if u128::from(drift) > ENCODED_DURATION_TOLERANCE.as_nanos() {
                return Err(format!(
                    "Duration of encoded file is wrong ({:.3}s instead of {:.3}s)",
                    duration as f64 / 1e9,
                    source.duration() as f64 / 1e9
                ));
            }
        }

        let container = (!discovered.caps().is_empty())
            .then(|| ("container".to_owned(), discovered.caps(), Some(self.expected.container.as_str())));
        let tracks = discovered.tracks_caps().iter().map(|(track_type, caps)| {
            (track_type.to_string(), caps.as_str(), self.expected.for_track(*track_type))
        });
        for (kind, caps, wanted) in container.into_iter().chain(tracks) {
            let wanted = match wanted {
                Some(wanted) => wanted,
                None => {
                    return Err(format!(
                        "Found a track of type {} in the encoded file but none was wanted",
                        kind
                    ))
                }
            };
            let fields = caps_fields(caps);
            for field in caps_fields(wanted) {
                if !fields.contains(&field) && !has_type_variant(&field, &fields) {
                    return Err(format!(
                        "Field {} of {} not in the {} caps of the encoded file ({})",
                        field, wanted, kind, caps
                    ));
                }
            }
        }
        Ok(())
    }
}

impl ResultClassifier for EncodedFileClassifier {
    fn classify(&self, outcome: &Outcome, ctx: &ClassifyContext<'_>) -> Verdict {
        let verdict = self.log.classify(outcome, ctx);
        if verdict.result != ResultState::Passed {
            return verdict;
        }
        match self.check_output(ctx.media) {
            Ok(()) => verdict,
            Err(message) => Verdict::new(ResultState::Failed, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::media::FakeMediaDescriptor;
    use crate::configuration::manifest::FakeMediaInfo;
    use std::time::Duration;

    fn exited(code: i32) -> Outcome {
        Outcome {
            result: ResultState::NotRun,
            message: String::new(),
            returncode: Some(code),
        }
    }

    fn timed_out() -> Outcome {
        Outcome {
            result: ResultState::Timeout,
            message: "Application timed out: 30 secs".to_owned(),
            returncode: Some(-2),
        }
    }

    fn issue(returncodes: Vec<i32>, timeout: bool, sometimes: bool) -> KnownIssue {
        KnownIssue {
            tests: vec![Regex::new(".*").unwrap()],
            returncodes,
            timeout,
            sometimes,
            bug: Some("#42".to_owned()),
        }
    }

    fn context<'a>(
        logfile: Option<&'a Path>,
        extra: &'a [PathBuf],
        issues: &'a [KnownIssue],
    ) -> ClassifyContext<'a> {
        ClassifyContext {
            logfile,
            extra_logfiles: extra,
            known_issues: issues,
            media: None,
        }
    }

    #[test]
    fn test_exit_codes() {
        let classifier = ExitCodeClassifier;
        let ctx = context(None, &[], &[]);
        assert_eq!(classifier.classify(&exited(0), &ctx).result, ResultState::Passed);
        assert_eq!(
            classifier.classify(&exited(139), &ctx),
            Verdict::new(ResultState::Failed, "Application exited with signal SIGSEGV")
        );
        #[cfg(unix)]
        assert_eq!(
            classifier.classify(&exited(-libc::SIGABRT), &ctx).message,
            "Application exited with signal SIGABRT"
        );
        assert_eq!(
            classifier.classify(&exited(20), &ctx).message,
            "Valgrind reported errors"
        );
        assert_eq!(
            classifier.classify(&exited(3), &ctx),
            Verdict::new(ResultState::Failed, "Application returned 3")
        );
    }

    #[test]
    fn test_loop_results_are_kept() {
        let ctx = context(None, &[], &[]);
        let verdict = ExitCodeClassifier.classify(&timed_out(), &ctx);
        assert_eq!(verdict.result, ResultState::Timeout);
        assert_eq!(verdict.message, "Application timed out: 30 secs");
    }

    #[test]
    fn test_known_issues() {
        let issues = vec![issue(vec![18], false, false)];
        let ctx = context(None, &[], &issues);
        assert_eq!(
            ExitCodeClassifier.classify(&exited(18), &ctx).result,
            ResultState::KnownError
        );
        assert_eq!(
            ExitCodeClassifier.classify(&exited(0), &ctx),
            Verdict::new(ResultState::Failed, "Expected return code 18")
        );

        let flaky = vec![issue(vec![18], false, true)];
        let ctx = context(None, &[], &flaky);
        assert_eq!(ExitCodeClassifier.classify(&exited(0), &ctx).result, ResultState::Passed);
    }

    #[test]
    fn test_timeout_with_caught_signal() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("test.md");
        fs::write(&log, "playing\n<Caught SIGNAL: SIGSEGV>\n").unwrap();
        let ctx = context(Some(&log), &[], &[]);
        assert_eq!(
            ValidateLogClassifier::default().classify(&timed_out(), &ctx),
            Verdict::new(ResultState::Failed, "<Caught SIGNAL: SIGSEGV>")
        );
    }

    #[test]
    fn test_expected_timeout() {
        let issues = vec![issue(vec![], true, false)];
        let ctx = context(None, &[], &issues);
        let verdict = ValidateLogClassifier::default().classify(&timed_out(), &ctx);
        assert_eq!(verdict.result, ResultState::KnownError);

        let ctx = context(None, &[], &[]);
        let verdict = ValidateLogClassifier::default().classify(&timed_out(), &ctx);
        assert_eq!(verdict.result, ResultState::Timeout);
    }

    #[test]
    fn test_hls_stall_near_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("test.md");
        let media = FakeMediaDescriptor::new(
            "stream",
            FakeMediaInfo {
                uri: "hls://example.org/stream.m3u8".to_owned(),
                duration: Duration::from_secs(100),
                ..FakeMediaInfo::default()
            },
        );
        let mut ctx = context(Some(&log), &[], &[]);
        ctx.media = Some(&media);

        fs::write(&log, "<position: 0:01:25.000000000 duration: 0:01:40.000000000 speed: 1.0 />").unwrap();
        assert_eq!(
            ValidateLogClassifier::default().classify(&timed_out(), &ctx).result,
            ResultState::KnownError
        );

        fs::write(&log, "<position: 0:00:25.000000000 duration: 0:01:40.000000000 speed: 1.0 />").unwrap();
        assert_eq!(
            ValidateLogClassifier::default().classify(&timed_out(), &ctx).result,
            ResultState::Timeout
        );
    }

    /// Writes a media check stand-in answering with `streams`.
    #[cfg(unix)]
    fn fake_media_check(dir: &Path, duration: &str, streams: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let tool = dir.join(format!("media-check-{}", duration));
        fs::write(
            &tool,
            format!(
                "#!/bin/sh\ncat > \"$3\" <<'XML'\n<file duration=\"{}\" uri=\"file:///media/out.webm\" seekable=\"true\">{}</file>\nXML\n",
                duration, streams
            ),
        )
        .unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        tool
    }

    fn webm_vorbis() -> ExpectedCaps {
        ExpectedCaps {
            container: "video/webm".to_owned(),
            video: None,
            audio: Some("audio/x-vorbis".to_owned()),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_encoded_file_checks() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.webm");
        fs::write(&output, b"").unwrap();
        let source = FakeMediaDescriptor::new(
            "clip",
            FakeMediaInfo {
                uri: "file:///media/clip.webm".to_owned(),
                duration: Duration::from_secs(10),
                ..FakeMediaInfo::default()
            },
        );
        let mut ctx = context(None, &[], &[]);
        ctx.media = Some(&source);
        let audio_only = r#"<streams caps="video/webm"><stream type="audio" caps="audio/x-vorbis, rate=(int)44100"/></streams>"#;

        let good = fake_media_check(dir.path(), "10100000000", audio_only);
        let classifier = EncodedFileClassifier::new(&output, &good, webm_vorbis());
        assert_eq!(classifier.classify(&exited(0), &ctx), Verdict::new(ResultState::Passed, ""));
        assert!(!dir.path().join("out.webm.media_info").exists());

        let short = fake_media_check(dir.path(), "4000000000", audio_only);
        let verdict = EncodedFileClassifier::new(&output, &short, webm_vorbis()).classify(&exited(0), &ctx);
        assert_eq!(verdict.result, ResultState::Failed);
        assert_eq!(verdict.message, "Duration of encoded file is wrong (4.000s instead of 10.000s)");

        let with_video = fake_media_check(
            dir.path(),
            "10000000000",
            r#"<streams caps="video/webm"><stream type="video" caps="video/x-vp8"/></streams>"#,
        );
        let verdict = EncodedFileClassifier::new(&output, &with_video, webm_vorbis()).classify(&exited(0), &ctx);
        assert_eq!(verdict.result, ResultState::Failed);
        assert!(verdict.message.starts_with("Found a track of type video"));

        // a failing tool run is not checked any further
        assert_eq!(
            classifier.classify(&exited(1), &ctx),
            Verdict::new(ResultState::Failed, "Application returned 1")
        );
    }

    #[test]
    fn test_undiscoverable_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("empty.webm");
        fs::write(&output, b"").unwrap();
        let ctx = context(None, &[], &[]);
        let verdict = EncodedFileClassifier::new(&output, dir.path().join("no-media-check"), webm_vorbis())
            .classify(&exited(0), &ctx);
        assert_eq!(verdict.result, ResultState::Failed);
        assert!(verdict.message.starts_with("Could not discover encoded file"));
    }

    #[test]
    fn test_caps_fields() {
        assert_eq!(
            caps_fields("video/quicktime, variant=(string)iso;"),
            vec!["video/quicktime", "variant=iso"]
        );
        assert!(has_type_variant("application/ogg", &caps_fields("audio/ogg")));
        assert!(!has_type_variant("video/webm", &caps_fields("video/x-matroska")));
    }

    #[test]
    fn test_criticals_fail_the_test() {
        let dir = tempfile::tempdir().unwrap();
        let validate_log = dir.path().join("test.validate.log");
        fs::write(
            &validate_log,
            "issue-id : buffer::before-segment\n    critical : buffer was received before a segment\n",
        )
        .unwrap();
        let extra = vec![validate_log];
        let ctx = context(None, &extra, &[]);
        assert_eq!(
            ValidateLogClassifier::default().classify(&exited(0), &ctx),
            Verdict::new(
                ResultState::Failed,
                "(critical errors: [buffer was received before a segment])"
            )
        );
    }
}
