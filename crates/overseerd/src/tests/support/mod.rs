//! Test doubles and process harness shared by the supervision suites.

mod harness;
mod reporter;
mod signals;
mod workers;

pub use harness::{Harness, IMPORT_TREE, SLEEPER_ARGS, dead_pid};
pub use reporter::SupervisionEvent;
pub use workers::{Calls, PROBE_KIND, ScriptedWorker};
