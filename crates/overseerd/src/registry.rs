//! Name → constructor tables for daemon and worker kinds.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::daemon::{Daemon, Import, Watcher};
use crate::process::Role;
use crate::spool::SpoolWorker;
use crate::worker::Worker;

/// Kind name of the daemon that supervises other daemons.
pub const WATCHER_KIND: &str = "watcher";
/// Kind name of the daemon that supervises import workers.
pub const IMPORT_KIND: &str = "import";
/// Kind name of the built-in spool-draining worker.
pub const SPOOL_KIND: &str = "spool";

/// Handle parameters that a kind could not decode. No handle is produced.
#[derive(Debug, Error)]
#[error("failed to decode parameters for {role} '{name}': {message}")]
pub struct ConfigDecodeError {
    /// Role of the handle being built.
    pub role: Role,
    /// Handle name.
    pub name: String,
    /// Decoder diagnostic.
    pub message: String,
}

type Constructor<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

/// Maps kind names to constructors.
pub struct Registry<T: ?Sized> {
    constructors: BTreeMap<String, Constructor<T>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

impl<T: ?Sized> Registry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `constructor` under `name`, replacing any earlier entry.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Builds a fresh instance of `name`, if registered.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<T>> {
        self.constructors.get(name).map(|constructor| constructor())
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }
}

/// Daemon and worker registries, built once at start-up.
#[derive(Debug, Default)]
pub struct Registries {
    /// Daemon kinds.
    pub daemons: Registry<dyn Daemon>,
    /// Worker kinds.
    pub workers: Registry<dyn Worker>,
}

impl Registries {
    /// Registries holding the kinds that ship with the binary.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registries = Self::default();
        registries
            .daemons
            .register(WATCHER_KIND, || Box::new(Watcher::default()));
        registries
            .daemons
            .register(IMPORT_KIND, || Box::new(Import::default()));
        registries
            .workers
            .register(SPOOL_KIND, || Box::new(SpoolWorker::default()));
        registries
    }
}
