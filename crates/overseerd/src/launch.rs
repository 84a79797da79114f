//! Entry-point dispatch for the `overseerd` binary.

use std::io::{self, Write};

use overseer_config::Command;
use tracing::info;

use crate::daemon::{self, daemons_status, new_daemon};
use crate::process::lifecycle::Exit;
use crate::process::{LaunchError, liveness, signals};
use crate::runtime::Runtime;

const LAUNCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::launch");

/// Runs the command selected on the command line.
///
/// # Errors
///
/// Returns a [`LaunchError`] when the selected daemon cannot be built, its
/// pid file cannot be claimed, or a one-shot command fails.
pub fn run(runtime: &Runtime) -> Result<Exit, LaunchError> {
    run_with_output(runtime, &mut io::stdout().lock())
}

/// Runs the selected command, writing any report to `out`.
pub fn run_with_output(runtime: &Runtime, out: &mut dyn Write) -> Result<Exit, LaunchError> {
    let config = runtime.config();
    let name = config.selected_daemon();
    match config.settings().command() {
        Command::Status => {
            let report = daemons_status(runtime, name);
            serde_json::to_writer(&mut *out, &report)?;
            writeln!(out).map_err(|source| LaunchError::Output { source })?;
            Ok(Exit::Completed)
        }
        Command::Signal(control) => {
            let daemon = new_daemon(runtime, name).ok_or_else(|| unknown(name))?;
            let context = &daemon.data().context;
            let pid = context
                .search()
                .map_err(|source| LaunchError::Signal {
                    name: name.to_owned(),
                    source,
                })?
                .filter(|pid| liveness::is_alive(*pid))
                .ok_or_else(|| LaunchError::NotRunning {
                    name: name.to_owned(),
                })?;
            let signal = signals::control_signal(control);
            liveness::send(pid, signal).map_err(|source| LaunchError::Signal {
                name: name.to_owned(),
                source,
            })?;
            info!(target: LAUNCH_TARGET, daemon = name, pid = pid.as_raw(), %signal, "signal sent");
            Ok(Exit::Completed)
        }
        Command::Run => {
            let daemon = new_daemon(runtime, name).ok_or_else(|| unknown(name))?;
            if config.selected_worker().is_none() {
                return Ok(daemon::start(&*daemon, runtime)?);
            }
            daemon.run(runtime).map_err(|source| LaunchError::Run {
                name: name.to_owned(),
                source,
            })?;
            Ok(runtime
                .termination()
                .signal()
                .map_or(Exit::Completed, Exit::Signalled))
        }
    }
}

fn unknown(name: &str) -> LaunchError {
    LaunchError::UnknownDaemon {
        name: name.to_owned(),
    }
}
