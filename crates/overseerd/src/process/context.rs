//! Identity and launch descriptor for one supervised process.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use nix::sys::stat::{Mode, mode_t, umask};
use nix::unistd::{Pid, setsid};
use overseer_config::RunAs;
use tracing::{debug, error, info, warn};

use crate::pidfile::{PidFile, PidFileError};

use super::PROCESS_TARGET;
use super::errors::ProcessError;
use super::liveness;
use super::paths;

/// Permission bits for pid files created by the process itself.
pub const DEFAULT_PID_PERM: u32 = 0o640;
/// Permission bits for pid files of handles built from configuration.
pub const HANDLE_PID_PERM: u32 = 0o644;

/// Attempts made to claim a pid file still held by a parent's hand-off.
const CLAIM_ATTEMPTS: usize = 5;
const CLAIM_BACKOFF: Duration = Duration::from_millis(20);

/// Whether a context describes a daemon or a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A supervising process.
    Daemon,
    /// A batch-processing process.
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Daemon => "daemon",
            Self::Worker => "worker",
        })
    }
}

/// Locates, spawns, probes and releases one process slot.
///
/// A context built for a child only ever reads the child's pid file. A
/// context describing the current process may also hold that file's lock,
/// which it owns exclusively until [`ProcessContext::release`].
#[derive(Debug)]
pub struct ProcessContext {
    name: String,
    role: Role,
    pid_path: Option<PathBuf>,
    pid_perm: u32,
    work_dir: Option<PathBuf>,
    env: Option<Vec<(OsString, OsString)>>,
    args: Option<Vec<OsString>>,
    run_as: Option<RunAs>,
    umask: Option<u32>,
    pid_file: Mutex<Option<PidFile>>,
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::new(String::new(), Role::Daemon)
    }
}

impl ProcessContext {
    /// Creates a context with no pid file and inherited environment and
    /// arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            pid_path: None,
            pid_perm: DEFAULT_PID_PERM,
            work_dir: None,
            env: None,
            args: None,
            run_as: None,
            umask: None,
            pid_file: Mutex::new(None),
        }
    }

    /// Sets the pid file path.
    #[must_use]
    pub fn with_pid_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pid_path = Some(path.into());
        self
    }

    /// Sets the permission bits used when the pid file is created.
    #[must_use]
    pub fn with_pid_perm(mut self, perm: u32) -> Self {
        self.pid_perm = perm;
        self
    }

    /// Replaces the inherited environment.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    /// Replaces the inherited argument vector; the first entry is the
    /// program.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the credential assumed by the spawned process.
    #[must_use]
    pub fn with_run_as(mut self, run_as: Option<RunAs>) -> Self {
        self.run_as = run_as;
        self
    }

    /// Sets the spawned process's working directory; `None` inherits ours.
    #[must_use]
    pub fn with_work_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.work_dir = dir;
        self
    }

    /// Sets the umask applied in the spawned process.
    #[must_use]
    pub fn with_umask(mut self, umask: Option<u32>) -> Self {
        self.umask = umask;
        self
    }

    /// Logical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role tag.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Configured pid file path.
    #[must_use]
    pub fn pid_path(&self) -> Option<&Path> {
        self.pid_path.as_deref()
    }

    /// Argument vector a spawn would use.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        self.args
            .clone()
            .unwrap_or_else(|| env::args_os().collect())
    }

    /// Whether this context currently holds its pid file lock.
    #[must_use]
    pub fn holds_pid_file(&self) -> bool {
        self.slot().as_ref().is_some_and(PidFile::is_held)
    }

    /// Returns the pid recorded in the pid file.
    ///
    /// A missing path or missing file is not an error. The pid may belong to
    /// a process that has since exited.
    pub fn search(&self) -> Result<Option<Pid>, ProcessError> {
        let Some(path) = self.pid_path.as_deref() else {
            return Ok(None);
        };
        match PidFile::read(path) {
            Ok(pid) => {
                debug!(
                    target: PROCESS_TARGET,
                    role = %self.role,
                    name = %self.name,
                    pid = pid.as_raw(),
                    "pid file found"
                );
                Ok(Some(pid))
            }
            Err(PidFileError::NotFound { .. }) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Whether the recorded pid answers the liveness probe.
    ///
    /// Lookup failures are logged and read as "not running".
    #[must_use]
    pub fn status(&self) -> bool {
        self.live_pid().is_some()
    }

    /// Whether a process other than this one is alive in the slot.
    #[must_use]
    pub fn running_elsewhere(&self) -> bool {
        self.live_pid().is_some_and(|pid| pid != Pid::this())
    }

    fn live_pid(&self) -> Option<Pid> {
        match self.search() {
            Ok(pid) => pid.filter(|pid| liveness::is_alive(*pid)),
            Err(error) => {
                error!(
                    target: PROCESS_TARGET,
                    role = %self.role,
                    name = %self.name,
                    error = %error,
                    "status lookup failed"
                );
                None
            }
        }
    }

    /// Launches the process detached into its own session.
    ///
    /// Standard streams are inherited. On failure any pid file this context
    /// holds is released before the error is returned. On success the
    /// child's pid is recorded in the pid file.
    pub fn spawn(&self) -> Result<Child, ProcessError> {
        let args = self.args();
        let Some((program, rest)) = args.split_first() else {
            self.release_after_failure();
            return Err(ProcessError::MissingProgram {
                role: self.role,
                name: self.name.clone(),
            });
        };

        let mut command = Command::new(program);
        command
            .args(rest)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }
        if let Some(vars) = &self.env {
            command.env_clear().envs(vars.iter().map(|(key, value)| (key, value)));
        }
        if let Some(run_as) = self.run_as {
            command.uid(run_as.uid).gid(run_as.gid);
        }
        let mask = self.umask;
        // SAFETY: the hook runs between fork and exec and only calls
        // `setsid` and `umask`, both async-signal-safe.
        unsafe {
            command.pre_exec(move || detach(mask));
        }

        match command.spawn() {
            Ok(child) => {
                info!(
                    target: PROCESS_TARGET,
                    role = %self.role,
                    name = %self.name,
                    pid = child.id(),
                    "process spawned"
                );
                self.record_child(&child);
                Ok(child)
            }
            Err(source) => {
                self.release_after_failure();
                Err(ProcessError::Spawn {
                    role: self.role,
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// Claims the pid file for the current process.
    ///
    /// The path is made absolute and its directory created. Calling this
    /// while the lock is already held keeps the existing lock.
    pub fn create_pid_file(&self) -> Result<(), ProcessError> {
        let Some(path) = self.pid_path.as_deref() else {
            return Ok(());
        };
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(PidFile::is_held) {
            return Ok(());
        }
        let path = paths::absolute(path)?;
        paths::ensure_pid_directory(&path)?;

        let mut attempt = 1;
        loop {
            match PidFile::create(&path, self.pid_perm) {
                Ok(file) => {
                    info!(
                        target: PROCESS_TARGET,
                        role = %self.role,
                        name = %self.name,
                        file = %path.display(),
                        "pid file created"
                    );
                    *slot = Some(file);
                    return Ok(());
                }
                Err(PidFileError::AlreadyRunning { .. }) if attempt < CLAIM_ATTEMPTS => {
                    attempt += 1;
                    thread::sleep(CLAIM_BACKOFF);
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Releases the pid file if this context holds it.
    pub fn release(&self) -> Result<(), ProcessError> {
        let taken = self.slot().take();
        if let Some(mut file) = taken {
            file.remove()?;
            info!(
                target: PROCESS_TARGET,
                role = %self.role,
                name = %self.name,
                "pid file released"
            );
        }
        Ok(())
    }

    fn record_child(&self, child: &Child) {
        let Some(path) = self.pid_path.as_deref() else {
            return;
        };
        let Ok(raw) = i32::try_from(child.id()) else {
            return;
        };
        match self.record_pid(path, Pid::from_raw(raw)) {
            Ok(true) => {}
            Ok(false) => debug!(
                target: PROCESS_TARGET,
                name = %self.name,
                "pid file already claimed; child will record itself"
            ),
            Err(error) => warn!(
                target: PROCESS_TARGET,
                name = %self.name,
                error = %error,
                "failed to record child pid"
            ),
        }
    }

    fn record_pid(&self, path: &Path, pid: Pid) -> Result<bool, ProcessError> {
        let path = paths::absolute(path)?;
        paths::ensure_pid_directory(&path)?;
        Ok(PidFile::record(&path, pid, self.pid_perm)?)
    }

    fn release_after_failure(&self) {
        if let Err(error) = self.release() {
            error!(
                target: PROCESS_TARGET,
                role = %self.role,
                name = %self.name,
                error = %error,
                "failed to release pid file after spawn failure"
            );
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<PidFile>> {
        self.pid_file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs in the child between fork and exec.
fn detach(mask: Option<u32>) -> io::Result<()> {
    setsid().map_err(io::Error::from)?;
    if let Some(bits) = mask.and_then(|mask| mode_t::try_from(mask).ok()) {
        umask(Mode::from_bits_truncate(bits));
    }
    Ok(())
}
