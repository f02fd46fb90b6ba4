use crate::app::error::Error;
use crate::configuration::constants::common::KILL_BACKOFF_START;
use std::collections::BTreeMap;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{self, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Fully resolved command line of a test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Complete environment of the child.
    pub env: BTreeMap<String, String>,
    /// Variables worth echoing in the reproduction line.
    pub shown_env: BTreeMap<String, String>,
    pub workdir: Option<PathBuf>,
}

impl Command {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Shell line reproducing the run.
    pub fn display(&self) -> String {
        let mut words: Vec<String> = self
            .shown_env
            .iter()
            .map(|(key, value)| format!("{}={}", key, shell_words::quote(value)))
            .collect();
        let mut argv = vec![self.program.display().to_string()];
        argv.extend(self.args.iter().cloned());
        words.push(shell_words::join(argv));
        words.join(" ")
    }

    fn to_std(&self) -> process::Command {
        let mut command = process::Command::new(&self.program);
        command.args(&self.args).env_clear().envs(&self.env);
        if let Some(workdir) = &self.workdir {
            command.current_dir(workdir);
        }
        command
    }
}

/// Looks `name` up in `PATH` the way a shell would.
pub fn which(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return if is_executable(candidate) {
            Some(candidate.to_path_buf())
        } else {
            None
        };
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Exit code of a child, signals being reported as their negated number.
pub fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

/// How often the worker reaps its child between kill requests.
const REAP_INTERVAL: Duration = Duration::from_millis(10);

/// A child process waited on by its own thread.
///
/// Only the worker reaps the child and signals it, so a signal can never
/// reach a recycled pid.
#[derive(Debug)]
pub struct Supervised {
    pid: u32,
    done: Receiver<io::Result<i32>>,
    kill: Sender<bool>,
    worker: Option<JoinHandle<()>>,
    returncode: Option<i32>,
}

impl Supervised {
    /// Starts `command`, returning once the child exists.
    pub fn spawn(command: &Command, stdout: Stdio, stderr: Stdio) -> Result<Self, Error> {
        let (start_tx, start_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let (kill_tx, kill_rx) = mpsc::channel::<bool>();
        let mut std_command = command.to_std();

        let worker = thread::spawn(move || {
            let spawned = std_command
                .stdin(Stdio::null())
                .stdout(stdout)
                .stderr(stderr)
                .spawn();
            let mut child = match spawned {
                Ok(child) => child,
                Err(err) => {
                    let _ = start_tx.send(Err(err));
                    return;
                }
            };
            if start_tx.send(Ok(child.id())).is_err() {
                let _ = child.kill();
            }
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        let _ = done_tx.send(Ok(exit_code(status)));
                        return;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        let _ = done_tx.send(Err(err));
                        return;
                    }
                }
                match kill_rx.recv_timeout(REAP_INTERVAL) {
                    // not reaped yet, the pid is still this child's
                    Ok(hard) => {
                        if let Err(err) = send_kill(child.id(), hard) {
                            debug!("Could not signal {}: {}", child.id(), err);
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        let _ = done_tx.send(child.wait().map(exit_code));
                        return;
                    }
                }
            }
        });

        let started = start_rx.recv().unwrap_or_else(|_| {
            Err(io::Error::new(io::ErrorKind::Other, "process worker died"))
        });
        match started {
            Ok(pid) => Ok(Self {
                pid,
                done: done_rx,
                kill: kill_tx,
                worker: Some(worker),
                returncode: None,
            }),
            Err(source) => {
                let _ = worker.join();
                Err(Error::Spawn {
                    program: command.program.display().to_string(),
                    source,
                })
            }
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn returncode(&self) -> Option<i32> {
        self.returncode
    }

    /// Waits up to `timeout` for the child to exit.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<i32> {
        if self.returncode.is_some() {
            return self.returncode;
        }
        match self.done.recv_timeout(timeout) {
            Ok(result) => self.finish(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.finish(Err(io::Error::new(io::ErrorKind::Other, "process worker died")))
            }
        }
    }

    pub fn try_wait(&mut self) -> Option<i32> {
        self.wait_timeout(Duration::from_millis(0))
    }

    fn finish(&mut self, result: io::Result<i32>) -> Option<i32> {
        let code = result.unwrap_or_else(|err| {
            warn!("Could not wait for process {}: {}", self.pid, err);
            -1
        });
        self.returncode = Some(code);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.returncode
    }

    /// Interrupts the child, escalating to a hard kill after a quarter of
    /// `ceiling`. Gives up with [`Error::Unkillable`] once `ceiling` elapsed.
    pub fn kill(&mut self, ceiling: Duration) -> Result<i32, Error> {
        let start = Instant::now();
        let mut wait = KILL_BACKOFF_START;
        let mut hard = false;

        loop {
            if let Some(code) = self.try_wait() {
                return Ok(code);
            }
            debug!("Subprocess {} is still alive, sending kill signal", self.pid);
            if self.kill.send(hard).is_err() {
                trace!("Worker of {} already gone", self.pid);
            }
            if let Some(code) = self.wait_timeout(wait) {
                return Ok(code);
            }
            wait = (wait * 2).min(Duration::from_secs(1));

            let elapsed = start.elapsed();
            if elapsed > ceiling / 4 {
                hard = true;
            }
            if elapsed > ceiling {
                error!(
                    "Could not kill subprocess {} after {} seconds",
                    self.pid,
                    ceiling.as_secs()
                );
                return Err(Error::Unkillable {
                    pid: self.pid,
                    ceiling,
                });
            }
        }
    }
}

#[cfg(unix)]
fn send_kill(pid: u32, hard: bool) -> io::Result<()> {
    let signal = if hard { libc::SIGKILL } else { libc::SIGINT };
    let ret = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(windows)]
fn send_kill(pid: u32, _hard: bool) -> io::Result<()> {
    process::Command::new("taskkill")
        .args(&["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_reproduction_line() {
        let mut command = Command::new("gst-validate-1.0").args(vec!["playbin3", "uri=file:///a b.webm"]);
        command
            .shown_env
            .insert("GST_VALIDATE".to_owned(), "fatal-criticals".to_owned());
        assert_eq!(
            command.display(),
            "GST_VALIDATE=fatal-criticals gst-validate-1.0 playbin3 'uri=file:///a b.webm'"
        );
    }

    #[cfg(unix)]
    fn shell(script: &str) -> Command {
        let mut command = Command::new("/bin/sh").arg("-c").arg(script);
        command.env = env::vars().collect();
        command
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_codes() {
        let mut child = Supervised::spawn(&shell("exit 3"), Stdio::null(), Stdio::null()).unwrap();
        assert_eq!(child.wait_timeout(Duration::from_secs(10)), Some(3));
        assert_eq!(child.returncode(), Some(3));

        let mut child = Supervised::spawn(&shell("kill -SEGV $$"), Stdio::null(), Stdio::null()).unwrap();
        assert_eq!(child.wait_timeout(Duration::from_secs(10)), Some(-libc::SIGSEGV));
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_sleeping_child() {
        let mut child = Supervised::spawn(&shell("sleep 30"), Stdio::null(), Stdio::null()).unwrap();
        assert_eq!(child.try_wait(), None);
        let code = child.kill(Duration::from_secs(30)).unwrap();
        assert!(code < 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_escalates_when_interrupt_is_ignored() {
        let script = "trap '' INT; while true; do sleep 0.1; done";
        let mut child = Supervised::spawn(&shell(script), Stdio::null(), Stdio::null()).unwrap();
        assert_eq!(child.wait_timeout(Duration::from_millis(200)), None);
        let start = Instant::now();
        assert_eq!(child.kill(Duration::from_secs(2)).unwrap(), -libc::SIGKILL);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_already_reaped_child() {
        let mut child = Supervised::spawn(&shell("exit 5"), Stdio::null(), Stdio::null()).unwrap();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(child.kill(Duration::from_secs(2)).unwrap(), 5);
        assert_eq!(child.returncode(), Some(5));
    }

    #[test]
    fn test_spawn_failure() {
        let command = Command::new("/definitely/not/a/binary");
        assert!(matches!(
            Supervised::spawn(&command, Stdio::null(), Stdio::null()),
            Err(Error::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_which() {
        assert!(which("sh").is_some());
        assert_eq!(which("/bin/sh"), Some(PathBuf::from("/bin/sh")));
        assert_eq!(which("no-such-binary-anywhere"), None);
    }
}
