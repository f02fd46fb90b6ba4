#[macro_use]
extern crate log;

#[macro_use]
extern crate derive_builder;

mod app;
mod configuration;
mod reporter;
mod time;

use log::LevelFilter;
use signal_hook::SIGINT;
use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use structopt::StructOpt;

use self::app::{Error, Launcher};
use self::{
    configuration::command_line::{LogLevel, Opt},
    configuration::manifest::Manifest,
};

const EXIT_SUCCESS: i32 = 0;
const EXIT_TEST_FAILURES: i32 = 1;
const EXIT_CONFIGURATION: i32 = 2;
const EXIT_INTERRUPTED: i32 = 3;
const EXIT_UNKILLABLE: i32 = 4;

fn main() {
    let options = Opt::from_args();

    if let Err(e) = init_logging(
        options.logging.unwrap_or(LogLevel::Info).into(),
        &options.log_output_file,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
        exit(EXIT_CONFIGURATION);
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&interrupted)) {
        warn!("Could not install the SIGINT handler: {}", e);
    }

    exit(run(options, interrupted));
}

fn run(options: Opt, interrupted: Arc<AtomicBool>) -> i32 {
    let manifest = match &options.file {
        Some(file) => match Manifest::load(file) {
            Ok(manifest) => manifest,
            Err(e) => {
                let e = Error::from(e);
                error!("Failed to load manifest file {}: {}", file.display(), e);
                return exit_code(&e);
            }
        },
        None => Manifest::default(),
    };
    debug!("Initiated configuration {:#?}", manifest);

    let list_only = options.list_tests;
    let mut launcher = Launcher::new(options, manifest, interrupted);
    if let Err(e) = launcher.setup() {
        error!("Failed to set up the testsuite: {}", e);
        return exit_code(&e);
    }
    if list_only {
        launcher.print_tests();
        return EXIT_SUCCESS;
    }

    match launcher.run() {
        Ok(summary) if summary.is_success() => EXIT_SUCCESS,
        Ok(_) => EXIT_TEST_FAILURES,
        Err(e) => {
            error!("{}", e);
            exit_code(&e)
        }
    }
}

fn exit_code(error: &Error) -> i32 {
    match error {
        Error::Interrupted => EXIT_INTERRUPTED,
        Error::Unkillable { .. } => EXIT_UNKILLABLE,
        _ => EXIT_CONFIGURATION,
    }
}

fn init_logging(level: LevelFilter, output: &Option<PathBuf>) -> Result<(), fern::InitError> {
    let mut dispatcher = fern::Dispatch::new()
        // Perform allocation-free log formatting
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record
                    .line()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "".to_owned()),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(log_file) = output {
        dispatcher = dispatcher.chain(fern::log_file(log_file)?)
    }
    dispatcher.apply()?;
    info!("Logging level {} enabled", level);
    Ok(())
}
