//! One supervision tick over a daemon's children, and the termination
//! cascade that signals them.

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::debug;

use crate::daemon::{Daemon, DaemonError};
use crate::process::{ProcessContext, liveness};
use crate::runtime::Runtime;
use crate::worker::{self, Worker};

const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");

/// A supervised child: either a daemon under the watcher or a worker under
/// a daemon.
pub(crate) trait ChildSlot {
    /// Logical name.
    fn name(&self) -> &str;

    /// Process slot of the child.
    fn context(&self) -> &ProcessContext;

    /// The worker this child runs, when `--worker` selection applies to it.
    fn inline(&self) -> Option<&dyn Worker>;
}

impl ChildSlot for Box<dyn Daemon> {
    fn name(&self) -> &str {
        &self.data().spec.name
    }

    fn context(&self) -> &ProcessContext {
        &self.data().context
    }

    fn inline(&self) -> Option<&dyn Worker> {
        None
    }
}

impl ChildSlot for Box<dyn Worker> {
    fn name(&self) -> &str {
        &self.data().spec.name
    }

    fn context(&self) -> &ProcessContext {
        &self.data().context
    }

    fn inline(&self) -> Option<&dyn Worker> {
        Some(&**self)
    }
}

/// Checks every child of `parent` once.
///
/// Live children are left alone; dead ones are respawned, or run in this
/// process when they are the selected worker. A spawn failure is reported
/// and retried on the next tick. An in-process run ends the tick with its
/// result.
pub(crate) fn tick<C: ChildSlot>(
    runtime: &Runtime,
    parent: &str,
    children: &[C],
) -> Result<(), DaemonError> {
    let reaped = runtime.reaper().reap();
    if reaped > 0 {
        debug!(target: SUPERVISOR_TARGET, parent, reaped, "reaped exited children");
    }
    let reporter = runtime.reporter();
    let selected = runtime.config().selected_worker();

    for child in children {
        let name = child.name();
        let inline = child.inline();
        if inline.is_some() && selected.is_some_and(|selected| selected != name) {
            reporter.child_skipped(parent, name);
            continue;
        }
        if child.context().running_elsewhere() {
            reporter.child_alive(parent, name);
            continue;
        }
        if let Some(worker) = inline
            && selected.is_some()
            && runtime.claim_inline()
        {
            debug!(target: SUPERVISOR_TARGET, parent, child = name, "running in process");
            worker::run(worker, runtime)?;
            return Ok(());
        }
        if !runtime.termination().is_running() {
            debug!(target: SUPERVISOR_TARGET, parent, child = name, "terminating; not spawning");
            continue;
        }
        match child.context().spawn() {
            Ok(process) => {
                reporter.child_spawned(parent, name, process.id());
                runtime.reaper().adopt(name, process);
            }
            Err(error) => reporter.spawn_failed(parent, name, &error),
        }
    }
    Ok(())
}

/// Sends `signal` to every child whose pid file resolves to a pid.
///
/// Children without a pid, or whose delivery fails, are reported and not
/// retried.
pub(crate) fn forward_signal<C: ChildSlot>(
    runtime: &Runtime,
    parent: &str,
    signal: Signal,
    children: &[C],
) {
    let reporter = runtime.reporter();
    for child in children {
        let name = child.name();
        let pid = match child.context().search() {
            Ok(Some(pid)) if pid == Pid::this() => {
                reporter.signal_unresolved(parent, name, "pid file names this process");
                continue;
            }
            Ok(Some(pid)) => pid,
            Ok(None) => {
                reporter.signal_unresolved(parent, name, "no pid file");
                continue;
            }
            Err(error) => {
                reporter.signal_unresolved(parent, name, &error.to_string());
                continue;
            }
        };
        match liveness::send(pid, signal) {
            Ok(()) => reporter.signal_forwarded(parent, name, pid, signal),
            Err(error) => reporter.signal_unresolved(parent, name, &error.to_string()),
        }
    }
}
