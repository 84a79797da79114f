//! Structured reporting for supervision events.

use std::sync::Arc;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::process::ProcessError;

const REPORTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervision");

/// Observer notified as supervision ticks and termination cascades run.
pub trait SupervisionReporter: Send + Sync {
    /// A child answered the liveness probe.
    fn child_alive(&self, parent: &str, child: &str);

    /// A child was spawned.
    fn child_spawned(&self, parent: &str, child: &str, pid: u32);

    /// Spawning a child failed; it is retried on the next tick.
    fn spawn_failed(&self, parent: &str, child: &str, error: &ProcessError);

    /// A child was skipped because another worker was selected.
    fn child_skipped(&self, parent: &str, child: &str);

    /// A termination signal reached a child.
    fn signal_forwarded(&self, parent: &str, child: &str, pid: Pid, signal: Signal);

    /// A child could not be resolved or signalled during termination.
    fn signal_unresolved(&self, parent: &str, child: &str, reason: &str);

    /// A worker tick was held back by its memory ceiling.
    fn backpressure(&self, worker: &str, memory: u64, limit: u64);
}

impl<T> SupervisionReporter for Arc<T>
where
    T: SupervisionReporter,
{
    fn child_alive(&self, parent: &str, child: &str) {
        (**self).child_alive(parent, child);
    }

    fn child_spawned(&self, parent: &str, child: &str, pid: u32) {
        (**self).child_spawned(parent, child, pid);
    }

    fn spawn_failed(&self, parent: &str, child: &str, error: &ProcessError) {
        (**self).spawn_failed(parent, child, error);
    }

    fn child_skipped(&self, parent: &str, child: &str) {
        (**self).child_skipped(parent, child);
    }

    fn signal_forwarded(&self, parent: &str, child: &str, pid: Pid, signal: Signal) {
        (**self).signal_forwarded(parent, child, pid, signal);
    }

    fn signal_unresolved(&self, parent: &str, child: &str, reason: &str) {
        (**self).signal_unresolved(parent, child, reason);
    }

    fn backpressure(&self, worker: &str, memory: u64, limit: u64) {
        (**self).backpressure(worker, memory, limit);
    }
}

/// Default reporter that records events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredReporter;

impl StructuredReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SupervisionReporter for StructuredReporter {
    fn child_alive(&self, parent: &str, child: &str) {
        tracing::debug!(
            target: REPORTER_TARGET,
            event = "child_alive",
            parent,
            child,
            "child is running"
        );
    }

    fn child_spawned(&self, parent: &str, child: &str, pid: u32) {
        tracing::info!(
            target: REPORTER_TARGET,
            event = "child_spawned",
            parent,
            child,
            pid,
            "child spawned"
        );
    }

    fn spawn_failed(&self, parent: &str, child: &str, error: &ProcessError) {
        tracing::error!(
            target: REPORTER_TARGET,
            event = "spawn_failed",
            parent,
            child,
            error = %error,
            "child failed to spawn"
        );
    }

    fn child_skipped(&self, parent: &str, child: &str) {
        tracing::trace!(
            target: REPORTER_TARGET,
            event = "child_skipped",
            parent,
            child,
            "child not selected"
        );
    }

    fn signal_forwarded(&self, parent: &str, child: &str, pid: Pid, signal: Signal) {
        tracing::info!(
            target: REPORTER_TARGET,
            event = "signal_forwarded",
            parent,
            child,
            pid = pid.as_raw(),
            %signal,
            "signal forwarded"
        );
    }

    fn signal_unresolved(&self, parent: &str, child: &str, reason: &str) {
        tracing::warn!(
            target: REPORTER_TARGET,
            event = "signal_unresolved",
            parent,
            child,
            reason,
            "child not signalled"
        );
    }

    fn backpressure(&self, worker: &str, memory: u64, limit: u64) {
        tracing::warn!(
            target: REPORTER_TARGET,
            event = "backpressure",
            worker,
            memory,
            limit,
            "memory above ceiling; skipping work"
        );
    }
}
