use std::io;
use std::sync::{Mutex, PoisonError};

use nix::sys::signal::Signal;
use overseer_config::ControlSignal;
use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::debug;

use super::PROCESS_TARGET;

/// Signals that start the termination protocol.
pub const TERMINATION_SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGQUIT];

/// Errors reported while subscribing to termination signals.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Produces subscriptions to termination signals.
pub trait SignalSource: Send + Sync {
    /// Starts intercepting termination signals.
    fn subscribe(&self) -> Result<Box<dyn SignalSubscription>, ShutdownError>;
}

/// One live interception of termination signals.
pub trait SignalSubscription: Send + Sync {
    /// Blocks until a signal arrives; `None` once the subscription closes.
    fn wait(&self) -> Option<Signal>;

    /// Stops interception and wakes any pending [`SignalSubscription::wait`].
    fn close(&self);
}

/// Termination signals delivered by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSignals;

impl SignalSource for SystemSignals {
    fn subscribe(&self) -> Result<Box<dyn SignalSubscription>, ShutdownError> {
        let signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        Ok(Box::new(SystemSubscription {
            signals: Mutex::new(signals),
            handle,
        }))
    }
}

struct SystemSubscription {
    signals: Mutex<Signals>,
    handle: Handle,
}

impl SignalSubscription for SystemSubscription {
    fn wait(&self) -> Option<Signal> {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        signals.forever().find_map(|raw| match Signal::try_from(raw) {
            Ok(signal) => Some(signal),
            Err(error) => {
                debug!(target: PROCESS_TARGET, raw, error = %error, "ignoring unknown signal");
                None
            }
        })
    }

    fn close(&self) {
        self.handle.close();
    }
}

/// Maps a command-line signal name onto the OS signal.
#[must_use]
pub fn control_signal(signal: ControlSignal) -> Signal {
    match signal {
        ControlSignal::Term => Signal::SIGTERM,
        ControlSignal::Quit => Signal::SIGQUIT,
        ControlSignal::Int => Signal::SIGINT,
    }
}
