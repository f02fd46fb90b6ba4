use crate::app::console::Console;
use crate::app::error::Error;
use crate::app::generator::{
    GenerationInput, MediaCheckGenerator, PipelineGenerator, PlaybackGenerator, TestSink,
    TestsGenerator, TranscodingGenerator,
};
use crate::app::process::which;
use crate::app::test::{RunContext, Test};
use crate::configuration::command_line::split_patterns;
use crate::configuration::constants::binaries;
use crate::configuration::constants::common::{DEFAULT_LONG_LIMIT, FLAKY_TESTS_DIR};
use crate::configuration::manifest::{BlacklistEntry, KnownIssue};
use crate::reporter::Reporter;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Test selection shared by every manager.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Comma separated regexes, as given on the command line.
    pub wanted: Vec<String>,
    pub blacklisted: Vec<String>,
    pub long_limit: Duration,
    pub blacklist: Vec<BlacklistEntry>,
    pub known_issues: Vec<KnownIssue>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            wanted: Vec::new(),
            blacklisted: Vec::new(),
            long_limit: DEFAULT_LONG_LIMIT,
            blacklist: Vec::new(),
            known_issues: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub fatal_error: bool,
    pub retry_on_failures: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunStatus {
    Completed,
    /// A test failed while running with `fatal_error`.
    Stopped,
}

/// Owns the tests of one family, decides which of them run and runs them.
#[derive(Debug)]
pub struct TestsManager {
    name: String,
    testsuite: String,
    required: Vec<&'static str>,
    binaries: BTreeMap<String, PathBuf>,
    generators: Vec<Box<dyn TestsGenerator>>,
    wanted: Vec<Regex>,
    blacklisted: Vec<(Regex, String)>,
    long_limit: Duration,
    known_issues: Vec<KnownIssue>,
    tests: Vec<Test>,
    unwanted: Vec<Test>,
}

impl TestsManager {
    pub fn new(
        name: &str,
        testsuite: &str,
        required: &[&'static str],
        generators: Vec<Box<dyn TestsGenerator>>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            testsuite: testsuite.to_owned(),
            required: required.to_vec(),
            binaries: BTreeMap::new(),
            generators,
            wanted: Vec::new(),
            blacklisted: Vec::new(),
            long_limit: DEFAULT_LONG_LIMIT,
            known_issues: Vec::new(),
            tests: Vec::new(),
            unwanted: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn testsuite(&self) -> &str {
        &self.testsuite
    }

    /// Looks the required programs up, `false` if one is missing.
    pub fn init(&mut self) -> bool {
        for name in &self.required {
            match which(&binaries::executable(name)) {
                Some(path) => {
                    debug!("{}: using {}", self.name, path.display());
                    self.binaries.insert((*name).to_owned(), path);
                }
                None => {
                    warn!("{} not found in PATH, {} tests are disabled", name, self.name);
                    return false;
                }
            }
        }
        true
    }

    /// Uses `path` for `name` instead of looking it up.
    pub fn set_binary(&mut self, name: &str, path: impl Into<PathBuf>) {
        self.binaries.insert(name.to_owned(), path.into());
    }

    pub fn set_settings(&mut self, settings: &ManagerSettings) -> Result<(), Error> {
        self.wanted = split_patterns(&settings.wanted)
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<_, _>>()?;
        let mut blacklisted = split_patterns(&settings.blacklisted)
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map(|regex| (regex, "blacklisted on the command line".to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        blacklisted.extend(
            settings
                .blacklist
                .iter()
                .map(|entry| (entry.pattern.clone(), entry.reason.clone())),
        );
        self.blacklisted = blacklisted;
        self.long_limit = settings.long_limit;
        self.known_issues = settings.known_issues.clone();
        Ok(())
    }

    fn check_duration(&self, test: &Test) -> bool {
        let duration = test.duration();
        if duration.as_nanos() > 0 && self.long_limit.as_secs() < duration.as_secs() {
            info!(
                "Not activating {} as its duration ({}) is superior than the long limit ({})",
                test.classname(),
                duration.as_secs(),
                self.long_limit.as_secs()
            );
            return false;
        }
        true
    }

    /// An explicitly wanted test runs unless it is too long, or it is also
    /// blacklisted by a pattern that is not exactly its classname.
    pub fn is_test_wanted(&self, test: &Test) -> bool {
        let classname = test.classname();
        let blacklisted = self
            .blacklisted
            .iter()
            .find(|(pattern, _)| pattern.is_match(classname));
        let whitelisted = match self.wanted.iter().find(|pattern| pattern.is_match(classname)) {
            Some(pattern) if blacklisted.is_some() && pattern.as_str() != classname => None,
            other => other,
        };

        if whitelisted.is_some() {
            return self.check_duration(test);
        }
        if let Some((_, reason)) = blacklisted {
            debug!("{} is blacklisted: {}", classname, reason);
            return false;
        }
        if !self.check_duration(test) {
            return false;
        }
        self.wanted.is_empty()
    }

    /// Runs every generator, one failing generator does not stop the others.
    ///
    /// Generators see the programs this manager found rather than `input.binaries`.
    pub fn populate(&mut self, input: &GenerationInput<'_>) {
        let binaries = self.binaries.clone();
        let input = GenerationInput {
            binaries: &binaries,
            ..*input
        };
        let generators = std::mem::take(&mut self.generators);
        for generator in &generators {
            if let Err(err) = generator.populate(&input, self) {
                warn!("{}: {} generator failed: {}", self.name, generator.name(), err);
            }
        }
        self.generators = generators;
        self.tests.sort_by(|a, b| a.classname().cmp(b.classname()));
        info!(
            "{}: {} tests selected, {} left out",
            self.name,
            self.tests.len(),
            self.unwanted.len()
        );
    }

    pub fn list_tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn unwanted_tests(&self) -> &[Test] {
        &self.unwanted
    }

    fn finish_test(test: &Test, console: &mut Console, reporter: &mut dyn Reporter) {
        console.test_done(test);
        reporter.after_test(test);
    }

    /// Runs the selected tests one after the other in classname order.
    ///
    /// Failing tests are retried once at the end when `retry_on_failures`
    /// is set; those passing the second time are flagged flaky.
    pub fn run_tests(
        &mut self,
        ctx: &RunContext,
        options: RunOptions,
        console: &mut Console,
        reporter: &mut dyn Reporter,
    ) -> Result<RunStatus, Error> {
        let mut to_retry = Vec::new();
        for (index, test) in self.tests.iter_mut().enumerate() {
            if ctx.is_interrupted() {
                return Err(Error::Interrupted);
            }
            test.run(ctx)?;
            if !test.result().is_success() {
                if options.retry_on_failures {
                    console.retrying(test);
                    to_retry.push(index);
                    continue;
                }
                Self::finish_test(test, console, reporter);
                if options.fatal_error {
                    return Ok(RunStatus::Stopped);
                }
                continue;
            }
            Self::finish_test(test, console, reporter);
        }

        let flaky_dir = ctx.logsdir.join(FLAKY_TESTS_DIR);
        for index in to_retry {
            if ctx.is_interrupted() {
                return Err(Error::Interrupted);
            }
            let test = &mut self.tests[index];
            if let Err(err) = test.copy_logfiles(&flaky_dir) {
                warn!("Could not keep logs of {}: {}", test.classname(), err);
            }
            test.clean();
            test.run(ctx)?;
            if test.result().is_success() {
                warn!("{} is flaky, it only passed once retried", test.classname());
                test.set_flaky(true);
            }
            Self::finish_test(test, console, reporter);
            if options.fatal_error && !test.result().is_success() {
                return Ok(RunStatus::Stopped);
            }
        }
        Ok(RunStatus::Completed)
    }
}

impl TestSink for TestsManager {
    fn add_test(&mut self, mut test: Test) {
        test.prefix_classname(&self.testsuite);
        for issue in &self.known_issues {
            if issue.applies_to(test.classname()) {
                test.add_known_issue(issue.clone());
            }
        }
        if self.is_test_wanted(&test) {
            self.tests.push(test);
        } else {
            self.unwanted.push(test);
        }
    }
}

pub type ManagerFactory = fn() -> TestsManager;

fn validate_playback() -> TestsManager {
    TestsManager::new(
        "validate",
        "validate",
        &[binaries::VALIDATE],
        vec![Box::new(PlaybackGenerator)],
    )
}

fn validate_transcoding() -> TestsManager {
    TestsManager::new(
        "validate_transcoding",
        "validate",
        &[binaries::TRANSCODING, binaries::MEDIA_CHECK],
        vec![Box::new(TranscodingGenerator)],
    )
}

fn validate_media_check() -> TestsManager {
    TestsManager::new(
        "validate_media_check",
        "validate",
        &[binaries::MEDIA_CHECK],
        vec![Box::new(MediaCheckGenerator)],
    )
}

fn validate_pipelines() -> TestsManager {
    TestsManager::new(
        "validate_pipelines",
        "validate",
        &[binaries::VALIDATE],
        vec![Box::new(PipelineGenerator)],
    )
}

/// Known test managers by name.
#[derive(Debug, Clone)]
pub struct ManagerRegistry {
    factories: BTreeMap<String, ManagerFactory>,
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register("validate", validate_playback);
        registry.register("validate_transcoding", validate_transcoding);
        registry.register("validate_media_check", validate_media_check);
        registry.register("validate_pipelines", validate_pipelines);
        registry
    }
}

impl ManagerRegistry {
    pub fn register(&mut self, name: &str, factory: ManagerFactory) {
        self.factories.insert(name.to_owned(), factory);
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(&self, name: &str) -> Option<TestsManager> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Managers named in `wanted`, or all of them, in name order.
    pub fn create_all(&self, wanted: &[String]) -> Vec<TestsManager> {
        let wanted = split_patterns(wanted);
        for name in &wanted {
            if !self.factories.contains_key(name) {
                warn!("Unknown test manager {}, known ones: {}", name, self.names().join(", "));
            }
        }
        self.factories
            .iter()
            .filter(|(name, _)| wanted.is_empty() || wanted.contains(name))
            .map(|(_, factory)| factory())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::result::ResultState;
    use crate::reporter::CompositeReporter;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn with_settings(settings: ManagerSettings) -> TestsManager {
        let mut manager = TestsManager::new("test", "validate", &[], Vec::new());
        manager.set_settings(&settings).unwrap();
        manager
    }

    fn test(classname: &str, duration: u64) -> Test {
        Test::builder()
            .application("true")
            .classname(classname)
            .duration(Duration::from_secs(duration))
            .build()
            .unwrap()
    }

    fn classnames(tests: &[Test]) -> Vec<&str> {
        tests.iter().map(Test::classname).collect()
    }

    #[test]
    fn test_everything_wanted_by_default() {
        let manager = with_settings(ManagerSettings::default());
        assert!(manager.is_test_wanted(&test("validate.file.playback.none.a", 10)));
        assert!(!manager.is_test_wanted(&test("validate.file.playback.none.long", 600)));
    }

    #[test]
    fn test_wanted_patterns() {
        let manager = with_settings(ManagerSettings {
            wanted: vec!["playback.seek.*,media_check".to_owned()],
            ..ManagerSettings::default()
        });
        assert!(manager.is_test_wanted(&test("validate.file.playback.seek_forward.a", 0)));
        assert!(manager.is_test_wanted(&test("validate.file.media_check.a", 0)));
        assert!(!manager.is_test_wanted(&test("validate.file.playback.none.a", 0)));
        // the long limit applies to wanted tests too
        assert!(!manager.is_test_wanted(&test("validate.file.playback.seek_forward.b", 301)));
    }

    #[test]
    fn test_blacklist() {
        let manager = with_settings(ManagerSettings {
            wanted: vec![
                "validate.file.playback.*".to_owned(),
                "validate.file.playback.none.exact".to_owned(),
            ],
            blacklisted: vec!["none".to_owned()],
            blacklist: vec![BlacklistEntry {
                pattern: Regex::new("transcode").unwrap(),
                reason: "broken encoder".to_owned(),
            }],
            ..ManagerSettings::default()
        });
        // matched by a generic wanted pattern: the blacklist wins
        assert!(!manager.is_test_wanted(&test("validate.file.playback.none.a", 0)));
        assert!(manager.is_test_wanted(&test("validate.file.playback.seek.a", 0)));
        assert!(!manager.is_test_wanted(&test("validate.file.transcode.to_webm.a", 0)));

        // wanted by its exact classname: the blacklist loses
        let exact = with_settings(ManagerSettings {
            wanted: vec!["validate.file.playback.none.exact".to_owned()],
            blacklisted: vec!["none".to_owned()],
            ..ManagerSettings::default()
        });
        assert!(exact.is_test_wanted(&test("validate.file.playback.none.exact", 0)));
    }

    #[test]
    fn test_long_limit() {
        let manager = with_settings(ManagerSettings {
            long_limit: Duration::from_secs(60),
            ..ManagerSettings::default()
        });
        assert!(manager.is_test_wanted(&test("validate.a", 60)));
        assert!(!manager.is_test_wanted(&test("validate.b", 61)));
        assert!(manager.is_test_wanted(&test("validate.c", 0)));
    }

    #[test]
    fn test_invalid_pattern() {
        let mut manager = TestsManager::new("test", "validate", &[], Vec::new());
        let settings = ManagerSettings {
            wanted: vec!["(unclosed".to_owned()],
            ..ManagerSettings::default()
        };
        assert!(matches!(manager.set_settings(&settings), Err(Error::Regex(_))));
    }

    #[test]
    fn test_add_test_prefixes_and_attaches_known_issues() {
        let mut manager = with_settings(ManagerSettings {
            blacklisted: vec!["skipme".to_owned()],
            known_issues: vec![KnownIssue {
                tests: vec![Regex::new("validate.file.playback").unwrap()],
                returncodes: vec![18],
                timeout: false,
                sometimes: false,
                bug: None,
            }],
            ..ManagerSettings::default()
        });
        manager.add_test(test("file.playback.none.b", 0));
        manager.add_test(test("file.playback.none.a", 0));
        manager.add_test(test("file.playback.skipme.a", 0));
        manager.add_test(test("file.media_check.a", 0));

        assert_eq!(
            classnames(manager.list_tests()),
            vec![
                "validate.file.playback.none.b",
                "validate.file.playback.none.a",
                "validate.file.media_check.a"
            ]
        );
        assert_eq!(classnames(manager.unwanted_tests()), vec!["validate.file.playback.skipme.a"]);
        assert_eq!(manager.list_tests()[0].known_issues().len(), 1);
        assert!(manager.list_tests()[2].known_issues().is_empty());
    }

    #[derive(Debug)]
    struct Scripts(Vec<(&'static str, String)>);

    impl TestsGenerator for Scripts {
        fn name(&self) -> &str {
            "scripts"
        }

        fn populate(&self, input: &GenerationInput<'_>, sink: &mut dyn TestSink) -> Result<(), Error> {
            let shell = input.binary("sh")?;
            for (name, script) in &self.0 {
                sink.add_test(
                    Test::builder()
                        .application(shell)
                        .classname(format!("scripts.{}", name))
                        .args(vec!["-c".to_owned(), script.clone()])
                        .build()
                        .map_err(Error::Builder)?,
                );
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl TestsGenerator for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn populate(&self, _input: &GenerationInput<'_>, _sink: &mut dyn TestSink) -> Result<(), Error> {
            Err(Error::ScenarioDiscovery("no scenarios".to_owned()))
        }
    }

    fn populated(logsdir: &Path, scripts: Vec<(&'static str, String)>) -> TestsManager {
        let mut manager = TestsManager::new(
            "scripts",
            "validate",
            &[],
            vec![Box::new(Broken), Box::new(Scripts(scripts))],
        );
        manager.set_binary("sh", "/bin/sh");
        let registry = crate::app::scenario::ScenarioRegistry::with_scenarios(Vec::new());
        let binaries = BTreeMap::new();
        let input = GenerationInput {
            resources: &[],
            scenarios: &[],
            encoding_formats: &[],
            pipelines: &[],
            registry: &registry,
            logsdir,
            timeout: Duration::from_secs(30),
            binaries: &binaries,
        };
        manager.populate(&input);
        manager
    }

    fn context(logsdir: &Path) -> RunContext {
        let mut ctx = RunContext::new(logsdir, Arc::new(AtomicBool::new(false)));
        ctx.poll_interval = Duration::from_millis(50);
        ctx
    }

    #[cfg(unix)]
    #[test]
    fn test_run_sorted_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = populated(
            dir.path(),
            vec![("b_fails", "exit 1".to_owned()), ("a_passes", "exit 0".to_owned())],
        );
        assert_eq!(
            classnames(manager.list_tests()),
            vec!["validate.scripts.a_passes", "validate.scripts.b_fails"]
        );

        let mut console = Console::default();
        let mut reporter = CompositeReporter::new();
        let status = manager
            .run_tests(&context(dir.path()), RunOptions::default(), &mut console, &mut reporter)
            .unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(reporter.summary().passed, 1);
        assert_eq!(reporter.summary().failed, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_fatal_error_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = populated(
            dir.path(),
            vec![("a_fails", "exit 1".to_owned()), ("b_passes", "exit 0".to_owned())],
        );
        let mut console = Console::default();
        let mut reporter = CompositeReporter::new();
        let options = RunOptions {
            fatal_error: true,
            retry_on_failures: false,
        };
        let status = manager
            .run_tests(&context(dir.path()), options, &mut console, &mut reporter)
            .unwrap();
        assert_eq!(status, RunStatus::Stopped);
        assert_eq!(reporter.summary().total(), 1);
        assert_eq!(manager.list_tests()[1].result(), ResultState::NotRun);
    }

    #[cfg(unix)]
    #[test]
    fn test_retry_flags_flaky_tests() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = format!(
            "if [ -e '{0}' ]; then exit 0; else touch '{0}'; exit 1; fi",
            marker.display()
        );
        let mut manager = populated(
            dir.path(),
            vec![("flaky", script), ("broken", "exit 2".to_owned())],
        );
        let mut console = Console::default();
        let mut reporter = CompositeReporter::new();
        let options = RunOptions {
            fatal_error: false,
            retry_on_failures: true,
        };
        manager
            .run_tests(&context(dir.path()), options, &mut console, &mut reporter)
            .unwrap();

        let flaky = &manager.list_tests()[1];
        assert_eq!(flaky.classname(), "validate.scripts.flaky");
        assert_eq!(flaky.result(), ResultState::Passed);
        assert!(flaky.is_flaky());
        assert!(dir
            .path()
            .join(FLAKY_TESTS_DIR)
            .join("validate")
            .join("scripts")
            .join("flaky.md")
            .exists());

        let broken = &manager.list_tests()[0];
        assert_eq!(broken.result(), ResultState::Failed);
        assert!(!broken.is_flaky());
        assert_eq!(reporter.summary().total(), 2);
        assert_eq!(reporter.summary().flaky, 1);
    }

    /// Raises the interrupt flag as soon as a test is reported.
    struct InterruptAfterFirst(Arc<AtomicBool>);

    impl Reporter for InterruptAfterFirst {
        fn after_test(&mut self, _test: &Test) {
            self.0.store(true, std::sync::atomic::Ordering::SeqCst);
        }

        fn final_report(&mut self) -> Result<(), crate::reporter::ReportError> {
            Ok(())
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_interrupt_between_quick_tests() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = populated(
            dir.path(),
            vec![("a_quick", "exit 0".to_owned()), ("b_quick", "exit 0".to_owned())],
        );
        let ctx = context(dir.path());
        let mut console = Console::default();
        let mut reporter = InterruptAfterFirst(Arc::clone(&ctx.interrupted));
        let outcome = manager.run_tests(&ctx, RunOptions::default(), &mut console, &mut reporter);
        assert!(matches!(outcome, Err(Error::Interrupted)));
        assert_eq!(manager.list_tests()[0].result(), ResultState::Passed);
        assert_eq!(manager.list_tests()[1].result(), ResultState::NotRun);
    }

    #[test]
    fn test_registry() {
        let mut registry = ManagerRegistry::default();
        assert_eq!(
            registry.names(),
            vec![
                "validate",
                "validate_media_check",
                "validate_pipelines",
                "validate_transcoding"
            ]
        );
        assert_eq!(registry.create("validate_transcoding").unwrap().testsuite(), "validate");
        assert!(registry.create("ges").is_none());

        fn custom() -> TestsManager {
            TestsManager::new("custom", "custom", &[], Vec::new())
        }
        registry.register("custom", custom);
        let managers = registry.create_all(&["custom,validate".to_owned()]);
        let names: Vec<&str> = managers.iter().map(TestsManager::name).collect();
        assert_eq!(names, vec!["custom", "validate"]);
    }
}
