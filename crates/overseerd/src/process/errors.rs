//! Error surface for process control and launch sequencing.

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

use crate::daemon::DaemonError;
use crate::pidfile::PidFileError;

use super::context::Role;
use super::signals::ShutdownError;

/// Errors raised while locating, spawning or signalling a process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The pid file could not be created, read or removed.
    #[error(transparent)]
    PidFile(#[from] PidFileError),
    /// The OS refused to start the process.
    #[error("failed to spawn {role} '{name}': {source}")]
    Spawn {
        /// Role of the process being spawned.
        role: Role,
        /// Logical process name.
        name: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The argument vector was empty.
    #[error("{role} '{name}' has no program to execute")]
    MissingProgram {
        /// Role of the process being spawned.
        role: Role,
        /// Logical process name.
        name: String,
    },
    /// Delivering a signal failed.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        /// Target process.
        pid: Pid,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The pid file path could not be made absolute.
    #[error("failed to resolve pid file path '{path}': {source}")]
    PidPath {
        /// Configured path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The pid directory could not be created.
    #[error("failed to create pid directory '{path}': {source}")]
    PidDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Fatal errors while a daemon or worker takes over its own slot.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The process could not claim its pid file.
    #[error("{role} '{name}' could not claim its pid file: {source}")]
    PidFile {
        /// Role of the starting process.
        role: Role,
        /// Logical process name.
        name: String,
        /// Underlying process error.
        #[source]
        source: ProcessError,
    },
    /// Signal handlers could not be installed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Errors surfaced to the binary entry point.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The selected daemon has no enabled, constructible handle.
    #[error("daemon '{name}' is not configured, disabled, or has no implementation")]
    UnknownDaemon {
        /// Selected daemon name.
        name: String,
    },
    /// Starting the selected daemon failed.
    #[error(transparent)]
    Startup(#[from] StartupError),
    /// A one-shot run of the selected daemon failed.
    #[error("daemon '{name}' failed: {source}")]
    Run {
        /// Selected daemon name.
        name: String,
        /// Underlying daemon error.
        #[source]
        source: DaemonError,
    },
    /// The selected daemon has no live process to signal.
    #[error("daemon '{name}' is not running")]
    NotRunning {
        /// Selected daemon name.
        name: String,
    },
    /// Looking up or signalling the selected daemon failed.
    #[error("failed to signal daemon '{name}': {source}")]
    Signal {
        /// Selected daemon name.
        name: String,
        /// Underlying process error.
        #[source]
        source: ProcessError,
    },
    /// Serialising the status report failed.
    #[error("failed to serialise status report: {source}")]
    StatusSerialise {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
    /// Writing command output failed.
    #[error("failed to write output: {source}")]
    Output {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
