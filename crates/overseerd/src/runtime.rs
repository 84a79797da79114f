//! Process-wide state shared by supervision ticks and the signal listener.

use std::env;
use std::ffi::OsString;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use overseer_config::Config;

use crate::process::{ChildReaper, SHUTDOWN_TIMEOUT, SignalSource, SystemSignals, Termination};
use crate::registry::Registries;
use crate::reporter::{StructuredReporter, SupervisionReporter};
use crate::worker::{MemorySampler, ProcessMemorySampler};

/// Everything a role process needs beyond its own handle.
pub struct Runtime {
    config: Arc<Config>,
    registries: Arc<Registries>,
    reporter: Arc<dyn SupervisionReporter>,
    reaper: ChildReaper,
    termination: Termination,
    signals: Arc<dyn SignalSource>,
    sampler: Arc<dyn MemorySampler>,
    exit_grace: Option<Duration>,
    inline_taken: AtomicBool,
    args: Vec<OsString>,
}

impl Runtime {
    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Daemon and worker kinds.
    #[must_use]
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Supervision event sink.
    #[must_use]
    pub fn reporter(&self) -> &dyn SupervisionReporter {
        self.reporter.as_ref()
    }

    /// Children spawned by this process.
    #[must_use]
    pub fn reaper(&self) -> &ChildReaper {
        &self.reaper
    }

    /// Lifecycle state of this process.
    #[must_use]
    pub fn termination(&self) -> &Termination {
        &self.termination
    }

    /// Source of termination signals.
    #[must_use]
    pub fn signals(&self) -> &dyn SignalSource {
        self.signals.as_ref()
    }

    /// Memory probe used by worker run loops.
    #[must_use]
    pub fn sampler(&self) -> &dyn MemorySampler {
        self.sampler.as_ref()
    }

    /// How long the listener waits for the tick loop before forcing exit.
    /// `None` never forces.
    #[must_use]
    pub fn exit_grace(&self) -> Option<Duration> {
        self.exit_grace
    }

    /// Arguments this process was invoked with.
    #[must_use]
    pub fn invocation_args(&self) -> &[OsString] {
        &self.args
    }

    /// Takes the single in-process run slot. Only the first call succeeds.
    pub fn claim_inline(&self) -> bool {
        !self.inline_taken.swap(true, Ordering::SeqCst)
    }
}

/// Assembles a [`Runtime`], defaulting every collaborator to its production
/// implementation.
pub struct RuntimeBuilder {
    config: Arc<Config>,
    registries: Arc<Registries>,
    reporter: Arc<dyn SupervisionReporter>,
    signals: Arc<dyn SignalSource>,
    sampler: Arc<dyn MemorySampler>,
    exit_grace: Option<Duration>,
    args: Vec<OsString>,
}

impl RuntimeBuilder {
    /// Starts from `config` and the built-in kinds.
    #[must_use]
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        Self {
            config: config.into(),
            registries: Arc::new(Registries::builtin()),
            reporter: Arc::new(StructuredReporter::new()),
            signals: Arc::new(SystemSignals),
            sampler: Arc::new(ProcessMemorySampler::new()),
            exit_grace: Some(SHUTDOWN_TIMEOUT),
            args: env::args_os().collect(),
        }
    }

    /// Replaces the kind registries.
    #[must_use]
    pub fn registries(mut self, registries: impl Into<Arc<Registries>>) -> Self {
        self.registries = registries.into();
        self
    }

    /// Replaces the supervision reporter.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn SupervisionReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replaces the signal source.
    #[must_use]
    pub fn signals(mut self, signals: Arc<dyn SignalSource>) -> Self {
        self.signals = signals;
        self
    }

    /// Replaces the memory sampler.
    #[must_use]
    pub fn sampler(mut self, sampler: Arc<dyn MemorySampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Sets the forced-exit grace period.
    #[must_use]
    pub fn exit_grace(mut self, grace: Option<Duration>) -> Self {
        self.exit_grace = grace;
        self
    }

    /// Replaces the invocation arguments children are respawned from.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Finishes the runtime.
    #[must_use]
    pub fn build(self) -> Runtime {
        Runtime {
            config: self.config,
            registries: self.registries,
            reporter: self.reporter,
            reaper: ChildReaper::new(),
            termination: Termination::new(),
            signals: self.signals,
            sampler: self.sampler,
            exit_grace: self.exit_grace,
            inline_taken: AtomicBool::new(false),
            args: self.args,
        }
    }
}
