use crate::app::console::Console;
use crate::app::error::Error;
use crate::app::generator::GenerationInput;
use crate::app::manager::{ManagerRegistry, ManagerSettings, RunOptions, RunStatus, TestsManager};
use crate::app::media::{MediaCatalog, MediaResource};
use crate::app::process::which;
use crate::app::scenario::{Scenario, ScenarioRegistry};
use crate::app::test::RunContext;
use crate::configuration::command_line::Opt;
use crate::configuration::constants::binaries;
use crate::configuration::constants::common::{DEFAULT_LONG_LIMIT, DEFAULT_SCENARIOS, DEFAULT_TIMEOUT};
use crate::configuration::manifest::Manifest;
use crate::reporter::allure::AllureReporter;
use crate::reporter::xunit::XunitReporter;
use crate::reporter::{CompositeReporter, Reporter, Summary};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Wires options and manifest into managers, then runs them.
#[derive(Debug)]
pub struct Launcher {
    opt: Opt,
    manifest: Manifest,
    ctx: RunContext,
    console: Console,
    registry: ManagerRegistry,
    managers: Vec<TestsManager>,
}

impl Launcher {
    pub fn new(opt: Opt, manifest: Manifest, interrupted: Arc<AtomicBool>) -> Self {
        let console = Console::new(opt.no_color);
        let mut ctx = RunContext::from_options(&opt, interrupted);
        ctx.no_color = !console.is_colorized();
        Self {
            opt,
            manifest,
            ctx,
            console,
            registry: ManagerRegistry::default(),
            managers: Vec::new(),
        }
    }

    pub fn with_registry(mut self, registry: ManagerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    fn settings(&self) -> ManagerSettings {
        ManagerSettings {
            wanted: self.opt.wanted_tests.clone(),
            blacklisted: self.opt.blacklisted_tests.clone(),
            long_limit: self
                .opt
                .long_limit
                .or(self.manifest.long_limit)
                .unwrap_or(DEFAULT_LONG_LIMIT),
            blacklist: self.manifest.blacklist.clone(),
            known_issues: self.manifest.known_issues.clone(),
        }
    }

    fn general_scenarios(&self, registry: &mut ScenarioRegistry) -> Vec<Arc<Scenario>> {
        let names: Vec<String> = if self.manifest.scenarios.is_empty() {
            DEFAULT_SCENARIOS.iter().map(|name| (*name).to_owned()).collect()
        } else {
            self.manifest.scenarios.clone()
        };
        names
            .iter()
            .filter_map(|name| registry.lookup(name))
            .collect()
    }

    fn media_resources(&self, registry: &mut ScenarioRegistry) -> Vec<MediaResource> {
        let mut paths: Vec<PathBuf> = self.opt.media_paths.clone();
        paths.extend(self.manifest.media_paths.iter().cloned());
        if paths.is_empty() {
            return Vec::new();
        }
        let media_check = which(&binaries::executable(binaries::MEDIA_CHECK));
        MediaCatalog::new(media_check, self.opt.update_media_info).scan(&paths, registry)
    }

    /// Initializes the managers, skipping those whose programs are missing,
    /// and generates their tests.
    pub fn setup(&mut self) -> Result<(), Error> {
        fs::create_dir_all(&self.ctx.logsdir).map_err(|e| Error::io(&self.ctx.logsdir, e))?;
        let settings = self.settings();

        let mut managers = Vec::new();
        for mut manager in self.registry.create_all(&self.opt.testers) {
            if !manager.init() {
                warn!("Skipping {} tests", manager.name());
                continue;
            }
            manager.set_settings(&settings)?;
            managers.push(manager);
        }
        if managers.is_empty() {
            warn!("No test manager could be initialized");
            self.managers = managers;
            return Ok(());
        }

        let mut registry = ScenarioRegistry::new(
            which(&binaries::executable(binaries::VALIDATE)),
            &self.ctx.logsdir,
        );
        let scenarios = self.general_scenarios(&mut registry);
        let resources = self.media_resources(&mut registry);
        debug!(
            "{} general scenarios, {} media resources",
            scenarios.len(),
            resources.len()
        );

        let no_binaries = BTreeMap::new();
        let input = GenerationInput {
            resources: &resources,
            scenarios: &scenarios,
            encoding_formats: &self.manifest.encoding_formats,
            pipelines: &self.manifest.pipelines,
            registry: &registry,
            logsdir: &self.ctx.logsdir,
            timeout: self.manifest.timeout.unwrap_or(DEFAULT_TIMEOUT),
            binaries: &no_binaries,
        };
        for manager in managers.iter_mut() {
            manager.populate(&input);
        }
        self.managers = managers;
        Ok(())
    }

    pub fn list_tests(&self) -> Vec<String> {
        self.managers
            .iter()
            .flat_map(|manager| manager.list_tests())
            .map(|test| test.classname().to_owned())
            .collect()
    }

    pub fn print_tests(&self) {
        self.console.list(&self.list_tests());
    }

    fn reporter(&self) -> CompositeReporter {
        let mut reporter = CompositeReporter::new();
        if let Some(path) = &self.opt.xunit_file {
            reporter.add(XunitReporter::new(path));
        }
        if let Some(dir) = &self.opt.allure_dir {
            reporter.add(AllureReporter::new(dir));
        }
        reporter
    }

    /// Runs every selected test, managers in name order.
    ///
    /// Reports are written even when the run is cut short.
    pub fn run(&mut self) -> Result<Summary, Error> {
        let options = RunOptions {
            fatal_error: self.opt.fatal_error,
            retry_on_failures: self.opt.retry_on_failures,
        };
        let mut reporter = self.reporter();
        let total = self.managers.iter().map(|m| m.list_tests().len()).sum();
        self.console.set_total(total);
        info!("Running {} tests, logs in {}", total, self.ctx.logsdir.display());

        let mut outcome = Ok(());
        for manager in self.managers.iter_mut() {
            match manager.run_tests(&self.ctx, options, &mut self.console, &mut reporter) {
                Ok(RunStatus::Completed) => {}
                Ok(RunStatus::Stopped) => {
                    warn!("Stopping on first failure as requested");
                    break;
                }
                Err(err) => {
                    error!("{}", err);
                    outcome = Err(err);
                    break;
                }
            }
        }

        let reported = reporter.final_report();
        let summary = reporter.summary().clone();
        self.console.summary(&summary);
        outcome?;
        reported?;
        Ok(summary)
    }
}
