//! Daemon handles, their kinds, and the supervision start-up path.

use nix::sys::signal::Signal;
use overseer_config::DaemonSpec;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::process::lifecycle::{self, Exit};
use crate::process::{
    HANDLE_PID_PERM, ProcessContext, Role, StartupError, paths, respawn_arguments,
};
use crate::registry::ConfigDecodeError;
use crate::runtime::Runtime;

mod import;
mod status;
mod watcher;

pub use import::Import;
pub use status::{Count, DaemonStatus, StatusReport, daemons_status};
pub use watcher::Watcher;

pub(crate) const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");

/// Errors a daemon tick can return. Returning one terminates the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// A worker selected for in-process execution failed to start.
    #[error(transparent)]
    Startup(#[from] StartupError),
}

/// Configuration and identity attached to a daemon handle.
#[derive(Debug, Default)]
pub struct DaemonData {
    /// Daemon settings.
    pub spec: DaemonSpec,
    /// Process slot of the daemon.
    pub context: ProcessContext,
}

/// Capability set of a daemon kind.
pub trait Daemon: Send + Sync {
    /// Attached configuration.
    fn data(&self) -> &DaemonData;

    /// Attaches configuration; rejects parameters the kind cannot decode.
    fn set_data(&mut self, data: DaemonData) -> Result<(), ConfigDecodeError>;

    /// Runs one supervision tick.
    fn run(&self, runtime: &Runtime) -> Result<(), DaemonError>;

    /// Forwards `signal` to every child, then releases the daemon's own pid
    /// file.
    fn terminate(&self, runtime: &Runtime, signal: Signal);
}

/// Builds the handle for the daemon configured under `name`.
///
/// Returns `None`, after logging, when the daemon is missing, disabled,
/// has no registered kind, or rejects its parameters.
pub fn new_daemon(runtime: &Runtime, name: &str) -> Option<Box<dyn Daemon>> {
    let config = runtime.config();
    let Some(spec) = config.daemon(name) else {
        info!(target: DAEMON_TARGET, daemon = name, "daemon not found");
        return None;
    };
    if !spec.enabled {
        debug!(target: DAEMON_TARGET, daemon = name, "daemon is disabled");
        return None;
    }
    let Some(mut daemon) = runtime.registries().daemons.create(spec.kind()) else {
        error!(
            target: DAEMON_TARGET,
            daemon = name,
            kind = %spec.kind(),
            "no daemon implementation registered"
        );
        return None;
    };

    let pid_dir = config.pid_dir();
    let pid_path = match paths::absolute(&paths::daemon_pid_path(
        pid_dir.as_std_path(),
        &spec.name,
    )) {
        Ok(path) => path,
        Err(error) => {
            error!(target: DAEMON_TARGET, daemon = name, error = %error, "init daemon");
            return None;
        }
    };
    let args = respawn_arguments(runtime.invocation_args(), &spec.name, None);
    let context = ProcessContext::new(spec.name.clone(), Role::Daemon)
        .with_pid_path(pid_path)
        .with_pid_perm(HANDLE_PID_PERM)
        .with_args(args)
        .with_run_as(spec.run_as)
        .with_work_dir(spec.work_dir.clone())
        .with_umask(spec.umask);

    if let Err(error) = daemon.set_data(DaemonData {
        spec: spec.clone(),
        context,
    }) {
        error!(target: DAEMON_TARGET, daemon = name, error = %error, "init daemon");
        return None;
    }
    Some(daemon)
}

/// Runs `daemon` as the current process until termination.
///
/// Claiming the pid file is fatal on failure. Each tick calls
/// [`Daemon::run`]; a tick error terminates the daemon as if it had
/// received `SIGTERM`.
pub fn start(daemon: &dyn Daemon, runtime: &Runtime) -> Result<Exit, StartupError> {
    let data = daemon.data();
    let name = data.spec.name.as_str();
    info!(target: DAEMON_TARGET, daemon = name, "starting daemon");
    data.context
        .create_pid_file()
        .map_err(|source| StartupError::PidFile {
            role: Role::Daemon,
            name: name.to_owned(),
            source,
        })?;

    let exit = lifecycle::drive(
        name,
        data.spec.interval(),
        runtime,
        |signal| daemon.terminate(runtime, signal),
        || daemon.run(runtime),
    );
    release(data);
    exit.map_err(StartupError::from)
}

/// Releases the daemon's own pid file, logging failures.
pub(crate) fn release(data: &DaemonData) {
    if let Err(error) = data.context.release() {
        error!(
            target: DAEMON_TARGET,
            daemon = %data.spec.name,
            error = %error,
            "daemon terminate"
        );
    }
}
