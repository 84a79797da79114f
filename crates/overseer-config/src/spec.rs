//! Declarative descriptions of supervised daemons and workers.
//!
//! Specs are read-only once the configuration has loaded. The daemon crate
//! turns them into live handles carrying a process context.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{MIN_INTERVAL, default_sleep};

/// Free-form parameters handed from a daemon spec to its workers.
pub type Params = BTreeMap<String, serde_json::Value>;

/// OS credential a spawned process assumes before exec.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct RunAs {
    /// Numeric user id.
    pub uid: u32,
    /// Numeric group id.
    pub gid: u32,
}

/// One daemon slot, keyed by name under `daemons:`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DaemonSpec {
    /// Filled from the mapping key when the file is decoded.
    #[serde(default)]
    pub name: String,
    /// Factory name; the daemon's own name when absent.
    #[serde(default)]
    pub kind: Option<String>,
    /// Disabled daemons never receive a handle.
    #[serde(default)]
    pub enabled: bool,
    /// Memory ceiling in bytes; `0` disables the ceiling.
    #[serde(default)]
    pub memory_limit: u64,
    /// Interval between supervision ticks.
    #[serde(default = "default_sleep", with = "humantime_serde")]
    pub sleep: Duration,
    /// Children supervised by this daemon.
    #[serde(default)]
    pub workers: Vec<WorkerSpec>,
    /// Parameters forwarded to every worker.
    #[serde(default)]
    pub params: Params,
    /// Credential for the spawned daemon process.
    #[serde(default)]
    pub run_as: Option<RunAs>,
    /// Umask applied in the spawned daemon process.
    #[serde(default)]
    pub umask: Option<u32>,
    /// Working directory of the spawned daemon process; inherited when absent.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl DaemonSpec {
    /// Builds an enabled spec with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            enabled: true,
            memory_limit: 0,
            sleep: default_sleep(),
            workers: Vec::new(),
            params: Params::new(),
            run_as: None,
            umask: None,
            work_dir: None,
        }
    }

    /// Factory name used to construct the daemon implementation.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }

    /// Tick interval, clamped to [`MIN_INTERVAL`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.sleep.max(MIN_INTERVAL)
    }

    /// Enabled children in specification order.
    pub fn enabled_workers(&self) -> impl Iterator<Item = &WorkerSpec> {
        self.workers.iter().filter(|worker| worker.enabled)
    }
}

impl Default for DaemonSpec {
    /// An unnamed, disabled spec; handles start from it before configuration
    /// data is attached.
    fn default() -> Self {
        Self {
            enabled: false,
            ..Self::new(String::new())
        }
    }
}

/// One worker slot inside a daemon's `workers:` list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct WorkerSpec {
    /// Worker name, unique within its parent daemon.
    pub name: String,
    /// Factory name; the worker's own name when absent.
    #[serde(default)]
    pub kind: Option<String>,
    /// Disabled workers never receive a handle.
    #[serde(default)]
    pub enabled: bool,
    /// Memory ceiling in bytes; `0` disables the ceiling.
    #[serde(default)]
    pub memory_limit: u64,
    /// Queue or partition label reported in run results.
    #[serde(default)]
    pub queue: String,
    /// Interval between run-loop ticks.
    #[serde(default = "default_sleep", with = "humantime_serde")]
    pub sleep: Duration,
    /// Credential for the spawned worker process.
    #[serde(default)]
    pub run_as: Option<RunAs>,
    /// Umask applied in the spawned worker process.
    #[serde(default)]
    pub umask: Option<u32>,
    /// Working directory of the spawned worker process; inherited when absent.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl WorkerSpec {
    /// Builds an enabled spec with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            enabled: true,
            memory_limit: 0,
            queue: String::new(),
            sleep: default_sleep(),
            run_as: None,
            umask: None,
            work_dir: None,
        }
    }

    /// Factory name used to construct the worker implementation.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }

    /// Tick interval, clamped to [`MIN_INTERVAL`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.sleep.max(MIN_INTERVAL)
    }
}

impl Default for WorkerSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            ..Self::new(String::new())
        }
    }
}
