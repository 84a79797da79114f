//! Running → Terminating → Exited state machine and the tick driver.
//!
//! Each role process runs two tasks: the tick loop on the calling thread and
//! a listener thread blocked on signal delivery. The listener moves the
//! state to `Terminating`, runs the termination cascade, then waits for the
//! tick loop to mark `Exited`. A tick failure drives the same transition
//! with `SIGTERM`.

use std::fmt::Display;
use std::process::ExitCode;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use nix::sys::signal::Signal;
use tracing::{error, info, warn};

use crate::runtime::Runtime;

use super::PROCESS_TARGET;
use super::signals::{ShutdownError, SignalSubscription};

/// Process-wide lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Ticking normally.
    Running,
    /// The termination cascade has started; no new children are spawned.
    Terminating,
    /// The tick loop has unwound.
    Exited,
}

/// How a role process stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// A one-shot command finished.
    Completed,
    /// An OS signal triggered termination.
    Signalled(Signal),
    /// A tick failure triggered termination.
    Cancelled,
}

impl Exit {
    /// Process exit code; any termination exits with status 1.
    #[must_use]
    pub fn code(self) -> ExitCode {
        match self {
            Self::Completed => ExitCode::SUCCESS,
            Self::Signalled(_) | Self::Cancelled => ExitCode::FAILURE,
        }
    }
}

#[derive(Debug)]
struct State {
    lifecycle: Lifecycle,
    signal: Option<Signal>,
}

/// Shared termination state, observed by the tick loop at iteration
/// boundaries.
#[derive(Debug)]
pub struct Termination {
    state: Mutex<State>,
    changed: Condvar,
}

impl Default for Termination {
    fn default() -> Self {
        Self::new()
    }
}

impl Termination {
    /// Starts in [`Lifecycle::Running`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                lifecycle: Lifecycle::Running,
                signal: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.guard().lifecycle
    }

    /// Whether termination has not begun.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }

    /// Signal that started termination, if any.
    #[must_use]
    pub fn signal(&self) -> Option<Signal> {
        self.guard().signal
    }

    /// Moves from `Running` to `Terminating`. Only the first caller wins.
    pub fn begin(&self, signal: Option<Signal>) -> bool {
        let mut state = self.guard();
        if state.lifecycle != Lifecycle::Running {
            return false;
        }
        state.lifecycle = Lifecycle::Terminating;
        state.signal = signal;
        self.changed.notify_all();
        true
    }

    /// Marks the tick loop as unwound.
    pub fn finish(&self) {
        let mut state = self.guard();
        state.lifecycle = Lifecycle::Exited;
        self.changed.notify_all();
    }

    /// Sleeps for `interval` unless termination begins first. Returns
    /// whether the loop should tick.
    pub fn wait_tick(&self, interval: Duration) -> bool {
        let state = self.guard();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, interval, |state| {
                state.lifecycle == Lifecycle::Running
            })
            .unwrap_or_else(PoisonError::into_inner);
        state.lifecycle == Lifecycle::Running
    }

    /// Waits up to `timeout` for [`Lifecycle::Exited`]; returns whether it
    /// was reached.
    pub fn wait_exited(&self, timeout: Duration) -> bool {
        let state = self.guard();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |state| {
                state.lifecycle != Lifecycle::Exited
            })
            .unwrap_or_else(PoisonError::into_inner);
        state.lifecycle == Lifecycle::Exited
    }

    fn guard(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ticks every `interval` until termination, running `on_terminate` exactly
/// once when it begins.
///
/// The first tick happens one interval after start.
pub(crate) fn drive<T, F, E>(
    name: &str,
    interval: Duration,
    runtime: &Runtime,
    on_terminate: T,
    mut tick: F,
) -> Result<Exit, ShutdownError>
where
    T: Fn(Signal) + Sync,
    F: FnMut() -> Result<(), E>,
    E: Display,
{
    let termination = runtime.termination();
    let subscription = runtime.signals().subscribe()?;
    let subscription: &dyn SignalSubscription = subscription.as_ref();

    thread::scope(|scope| {
        let listener = scope.spawn(|| listen(name, runtime, subscription, &on_terminate));

        while termination.wait_tick(interval) {
            if let Err(failure) = tick() {
                error!(
                    target: PROCESS_TARGET,
                    name,
                    error = %failure,
                    "tick failed; terminating"
                );
                if termination.begin(None) {
                    on_terminate(Signal::SIGTERM);
                }
                break;
            }
        }

        termination.finish();
        subscription.close();
        if listener.join().is_err() {
            warn!(target: PROCESS_TARGET, name, "signal listener panicked");
        }
    });

    Ok(termination
        .signal()
        .map_or(Exit::Cancelled, Exit::Signalled))
}

fn listen<T>(name: &str, runtime: &Runtime, subscription: &dyn SignalSubscription, on_terminate: &T)
where
    T: Fn(Signal) + Sync,
{
    let termination = runtime.termination();
    let Some(signal) = subscription.wait() else {
        info!(target: PROCESS_TARGET, name, "done");
        return;
    };
    if !termination.begin(Some(signal)) {
        return;
    }
    info!(target: PROCESS_TARGET, name, %signal, "terminating");
    on_terminate(signal);

    let Some(grace) = runtime.exit_grace() else {
        return;
    };
    if !termination.wait_exited(grace) {
        warn!(
            target: PROCESS_TARGET,
            name,
            grace_ms = grace.as_millis(),
            "tick loop did not unwind in time; forcing exit"
        );
        std::process::exit(1);
    }
}
