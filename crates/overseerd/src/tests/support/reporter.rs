//! Test double for [`SupervisionReporter`] that records events for assertions.

use std::sync::Mutex;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::process::ProcessError;
use crate::reporter::SupervisionReporter;

/// Supervision events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisionEvent {
    Alive(String),
    Spawned(String),
    SpawnFailed(String),
    Skipped(String),
    Forwarded { child: String, signal: Signal },
    Unresolved(String),
    Backpressure { worker: String, memory: u64, limit: u64 },
}

/// Records supervision events in arrival order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<SupervisionEvent>>,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SupervisionEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: SupervisionEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl SupervisionReporter for RecordingReporter {
    fn child_alive(&self, _parent: &str, child: &str) {
        self.record(SupervisionEvent::Alive(child.to_owned()));
    }

    fn child_spawned(&self, _parent: &str, child: &str, _pid: u32) {
        self.record(SupervisionEvent::Spawned(child.to_owned()));
    }

    fn spawn_failed(&self, _parent: &str, child: &str, _error: &ProcessError) {
        self.record(SupervisionEvent::SpawnFailed(child.to_owned()));
    }

    fn child_skipped(&self, _parent: &str, child: &str) {
        self.record(SupervisionEvent::Skipped(child.to_owned()));
    }

    fn signal_forwarded(&self, _parent: &str, child: &str, _pid: Pid, signal: Signal) {
        self.record(SupervisionEvent::Forwarded {
            child: child.to_owned(),
            signal,
        });
    }

    fn signal_unresolved(&self, _parent: &str, child: &str, _reason: &str) {
        self.record(SupervisionEvent::Unresolved(child.to_owned()));
    }

    fn backpressure(&self, worker: &str, memory: u64, limit: u64) {
        self.record(SupervisionEvent::Backpressure {
            worker: worker.to_owned(),
            memory,
            limit,
        });
    }
}
