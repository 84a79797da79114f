//! Temporary pid directory, runtime wiring and real child processes.

use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::Pid;
use overseer_config::{Config, ConfigFile, Settings};
use tempfile::TempDir;

use crate::pidfile::PidFile;
use crate::runtime::{Runtime, RuntimeBuilder};

use super::reporter::RecordingReporter;
use super::signals::ManualSignals;
use super::workers::{FixedMemory, test_registries};

/// Invocation arguments children are respawned from. Role selectors appended
/// by the supervisor land in the shell's positional parameters.
pub const SLEEPER_ARGS: [&str; 3] = ["/bin/sh", "-c", "exec sleep 30"];

/// An import daemon with two enabled probe workers and one disabled.
pub const IMPORT_TREE: &str = r"
daemons:
  watcher:
    enabled: true
    sleep: 10ms
    workers:
      - { name: import, enabled: true }
  import:
    enabled: true
    sleep: 10ms
    workers:
      - { name: alpha, kind: probe, enabled: true, sleep: 10ms }
      - { name: beta, kind: probe, enabled: true, sleep: 10ms }
      - { name: gamma, kind: probe, enabled: false }
";

const EXIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Owns the temp directory, the doubles, and every process a test starts.
pub struct Harness {
    dir: TempDir,
    pub reporter: Arc<RecordingReporter>,
    pub signals: ManualSignals,
    pub memory: Arc<FixedMemory>,
    sleepers: Vec<Child>,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
            reporter: Arc::new(RecordingReporter::default()),
            signals: ManualSignals::default(),
            memory: Arc::new(FixedMemory::new(0)),
            sleepers: Vec::new(),
        }
    }

    /// Directory pid files are written to.
    #[must_use]
    pub fn pid_dir(&self) -> PathBuf {
        self.dir.path().join("pids")
    }

    /// Pid file path of `file` inside the pid directory.
    #[must_use]
    pub fn pid_path(&self, file: &str) -> PathBuf {
        self.pid_dir().join(file)
    }

    /// Settings pointing at the harness pid directory.
    #[must_use]
    pub fn settings(&self, daemon: &str, worker: Option<&str>) -> Settings {
        let pid_dir = Utf8PathBuf::from_path_buf(self.pid_dir()).expect("utf-8 temp dir");
        Settings {
            pid_dir: Some(pid_dir),
            daemon: daemon.to_owned(),
            worker: worker.map(str::to_owned),
            ..Settings::default()
        }
    }

    /// Configuration for `yaml` with explicit settings.
    #[must_use]
    pub fn config_from(&self, yaml: &str, settings: Settings) -> Config {
        let file = ConfigFile::from_yaml(yaml).expect("valid configuration");
        Config::from_parts(settings, file)
    }

    /// Configuration for `yaml`, selecting `daemon` and optionally `worker`.
    #[must_use]
    pub fn config(&self, yaml: &str, daemon: &str, worker: Option<&str>) -> Config {
        self.config_from(yaml, self.settings(daemon, worker))
    }

    /// Runtime wired to the harness doubles.
    #[must_use]
    pub fn runtime(&self, config: Config) -> Runtime {
        RuntimeBuilder::new(config)
            .registries(test_registries())
            .reporter(self.reporter.clone())
            .signals(Arc::new(self.signals.clone()))
            .sampler(self.memory.clone())
            .exit_grace(None)
            .args(SLEEPER_ARGS)
            .build()
    }

    /// Runtime for [`IMPORT_TREE`] with the import daemon selected.
    #[must_use]
    pub fn import_runtime(&self, worker: Option<&str>) -> Runtime {
        self.runtime(self.config(IMPORT_TREE, "import", worker))
    }

    /// Starts a long-running process the test owns.
    pub fn start_sleeper(&mut self) -> Pid {
        let child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");
        let pid = Pid::from_raw(i32::try_from(child.id()).expect("pid fits i32"));
        self.sleepers.push(child);
        pid
    }

    /// Writes `pid` to `file` in the pid directory.
    pub fn write_pid(&self, file: &str, pid: Pid) {
        fs::create_dir_all(self.pid_dir()).expect("create pid dir");
        fs::write(self.pid_path(file), pid.as_raw().to_string()).expect("write pid file");
    }

    /// Waits for the owned sleeper `pid` to exit and returns the signal that
    /// ended it.
    pub fn exit_signal(&mut self, pid: Pid) -> Option<Signal> {
        let child = self
            .sleepers
            .iter_mut()
            .find(|child| i64::from(child.id()) == i64::from(pid.as_raw()))
            .expect("sleeper is owned by the harness");
        let deadline = Instant::now() + EXIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Some(status) = child.try_wait().expect("poll sleeper") {
                return status
                    .signal()
                    .and_then(|raw| Signal::try_from(raw).ok());
            }
            thread::sleep(POLL_INTERVAL);
        }
        None
    }

    /// Pid recorded in `file`, if any.
    #[must_use]
    pub fn recorded_pid(&self, file: &str) -> Option<Pid> {
        PidFile::read(&self.pid_path(file)).ok()
    }
}

/// A pid that has exited and been reaped.
#[must_use]
pub fn dead_pid() -> Pid {
    let mut child = Command::new("true").spawn().expect("spawn true");
    let pid = Pid::from_raw(i32::try_from(child.id()).expect("pid fits i32"));
    child.wait().expect("reap true");
    pid
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for child in &mut self.sleepers {
            let _ = child.kill();
            let _ = child.wait();
        }
        kill_recorded(&self.pid_dir());
    }
}

/// Kills every process group named by a pid file under `dir`.
fn kill_recorded(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(pid) = PidFile::read(&entry.path()) else {
            continue;
        };
        if pid == Pid::this() || pid.as_raw() <= 1 {
            continue;
        }
        let _ = killpg(pid, Signal::SIGKILL);
        let _ = kill(pid, Signal::SIGKILL);
    }
}
