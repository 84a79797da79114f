//! Process identity, spawning and lifecycle plumbing.

use std::time::Duration;

pub(crate) mod arguments;
mod context;
mod errors;
pub(crate) mod lifecycle;
pub(crate) mod liveness;
pub(crate) mod paths;
mod reaper;
pub(crate) mod signals;

pub use arguments::respawn_arguments;
pub use context::{HANDLE_PID_PERM, ProcessContext, Role};
pub use errors::{LaunchError, ProcessError, StartupError};
pub use lifecycle::{Exit, Lifecycle, Termination};
pub use reaper::ChildReaper;
pub use signals::{ShutdownError, SignalSource, SignalSubscription, SystemSignals};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
/// Grace period between the termination cascade and a forced exit.
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
