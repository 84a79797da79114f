//! Pid-file supervision for a single host.
//!
//! One binary plays three roles, chosen by its own command line. The
//! `watcher` keeps a set of daemons alive; each daemon keeps its workers
//! alive; each worker runs a batch loop bounded by a memory ceiling. A
//! supervisor respawns missing children by re-invoking the binary with the
//! child's role selectors, so every process reads its role the same way.
//!
//! ## Pid files
//!
//! Each slot is guarded by a pid file holding an exclusive advisory lock.
//! Daemons live at `<pid-dir>/<name>.pid`, workers at
//! `<pid-dir>/<parent>_<name>.pid`. A recorded pid is only trusted after a
//! signal-0 liveness probe, so stale files left by crashes are harmless.
//!
//! ## Termination
//!
//! SIGINT, SIGTERM and SIGQUIT move a process from running to terminating.
//! Daemons forward the signal to every child they can resolve, then release
//! their own pid file; workers run their `terminate` hook first. The tick
//! loop unwinds at its next boundary, and a listener forces exit if it has
//! not done so within the grace period.

pub mod daemon;
mod launch;
pub mod pidfile;
pub mod process;
pub mod registry;
mod reporter;
mod runtime;
mod spool;
mod supervisor;
mod telemetry;
pub mod worker;

pub use launch::{run, run_with_output};
pub use reporter::{StructuredReporter, SupervisionReporter};
pub use runtime::{Runtime, RuntimeBuilder};
pub use spool::SpoolWorker;
pub use telemetry::{TelemetryError, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
