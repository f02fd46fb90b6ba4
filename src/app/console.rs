use crate::app::result::ResultState;
use crate::app::test::Test;
use crate::configuration::constants::env as vars;
use crate::reporter::Summary;
use owo_colors::{OwoColorize, Style};
use std::io::IsTerminal;

#[derive(Debug, Default, Clone)]
struct Styles {
    is_colorized: bool,
    count: Style,
    pass: Style,
    fail: Style,
    timeout: Style,
    known: Style,
    skip: Style,
    retry: Style,
    path: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.is_colorized = true;
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.timeout = Style::new().purple().bold();
        self.known = Style::new().yellow().bold();
        self.skip = Style::new().yellow();
        self.retry = Style::new().magenta().bold();
        self.path = Style::new().blue();
    }

    fn for_result(&self, result: ResultState) -> Style {
        match result {
            ResultState::Passed => self.pass,
            ResultState::Failed => self.fail,
            ResultState::Timeout => self.timeout,
            ResultState::KnownError => self.known,
            ResultState::NotRun => self.skip,
        }
    }
}

/// Operator facing output: one line per finished test and the final statistics.
#[derive(Debug, Default)]
pub struct Console {
    styles: Styles,
    total: usize,
    current: usize,
}

impl Console {
    pub fn new(no_color: bool) -> Self {
        let forced = std::env::var_os(vars::FORCE_COLORS).is_some();
        let mut console = Self::default();
        if forced || (!no_color && std::io::stdout().is_terminal()) {
            console.styles.colorize();
        }
        console
    }

    pub fn is_colorized(&self) -> bool {
        self.styles.is_colorized
    }

    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        self.current = 0;
    }

    fn counter(&self) -> String {
        let width = self.total.to_string().len();
        format!("[{:>width$}/{}]", self.current, self.total, width = width)
    }

    pub fn format_result(&self, test: &Test) -> String {
        let state = test.result();
        let mut line = format!(
            "{} {}: {}",
            self.counter().style(self.styles.count),
            test.classname(),
            state.style(self.styles.for_result(state))
        );
        if !test.message().is_empty() {
            line.push_str(&format!(" ({})", test.message()));
        }
        if test.is_flaky() {
            line.push_str(&format!(" {}", "[flaky]".style(self.styles.retry)));
        }
        if !test.result().is_success() {
            if let Some(logfile) = test.logfile() {
                line.push_str(&format!(
                    "\n    {} {}",
                    "Log:".style(self.styles.count),
                    logfile.display().style(self.styles.path)
                ));
            }
        }
        line
    }

    /// Prints the line of a test that reached its final result.
    pub fn test_done(&mut self, test: &Test) {
        self.current += 1;
        println!("{}", self.format_result(test));
    }

    pub fn format_retry(&self, test: &Test) -> String {
        format!(
            "{} {}: {} ({}), will retry",
            "RETRY".style(self.styles.retry),
            test.classname(),
            test.result().style(self.styles.for_result(test.result())),
            test.message()
        )
    }

    pub fn retrying(&self, test: &Test) {
        println!("{}", self.format_retry(test));
    }

    pub fn list(&self, classnames: &[String]) {
        for classname in classnames {
            println!("{}", classname);
        }
        println!(
            "\n{} tests",
            classnames.len().style(self.styles.count)
        );
    }

    pub fn format_summary(&self, summary: &Summary) -> String {
        let rows = [
            ("Passed", summary.passed, self.styles.pass),
            ("Failed", summary.failed, self.styles.fail),
            ("Timeout", summary.timeout, self.styles.timeout),
            ("Known error", summary.known_error, self.styles.known),
            ("Not run", summary.not_run, self.styles.skip),
            ("Flaky", summary.flaky, self.styles.retry),
        ];
        let mut table = format!(
            "\nStatistics:\n-----------\n\n{:>20}: {:.3} secs\n\n",
            "Total time spent",
            summary.time.as_secs_f64()
        );
        for (name, count, style) in rows.iter() {
            let count = if *count > 0 {
                count.style(*style).to_string()
            } else {
                count.to_string()
            };
            table.push_str(&format!("{:>20}: {}\n", name, count));
        }
        table.push_str(&format!(
            "{:>20}\n{:>20}: {}\n",
            "--------",
            "Total",
            summary.total().style(self.styles.count)
        ));
        table
    }

    pub fn summary(&self, summary: &Summary) {
        println!("{}", self.format_summary(summary));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

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
    fn test_plain_result_line() {
        let mut console = Console::default();
        console.set_total(12);
        console.current = 3;
        let test = finished("validate.file.playback.none.a", ResultState::Failed, "Application returned 1");
        assert_eq!(
            console.format_result(&test),
            "[ 3/12] validate.file.playback.none.a: Failed (Application returned 1)"
        );
        let test = finished("validate.file.playback.none.b", ResultState::Passed, "");
        assert_eq!(
            console.format_result(&test),
            "[ 3/12] validate.file.playback.none.b: Passed"
        );
    }

    #[test]
    fn test_colorized_result_line() {
        let mut console = Console::default();
        console.styles.colorize();
        console.set_total(1);
        let test = finished("validate.a", ResultState::Passed, "");
        let line = console.format_result(&test);
        assert!(line.contains("\u{1b}["));
        assert!(line.contains("Passed"));
    }

    #[test]
    fn test_summary_table() {
        let console = Console::default();
        let summary = Summary {
            passed: 3,
            failed: 1,
            flaky: 1,
            ..Summary::default()
        };
        let table = console.format_summary(&summary);
        assert!(table.contains("              Passed: 3\n"));
        assert!(table.contains("              Failed: 1\n"));
        assert!(table.contains("               Total: 4\n"));
    }
}
