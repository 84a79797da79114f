//! Resident memory sampling for run-loop backpressure.
//!
//! Rust has no collector to force before measuring, so the sample is the
//! process's resident set size and the ceiling is a soft signal.

use std::sync::{Mutex, PoisonError};

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Source of the current process's memory usage.
pub trait MemorySampler: Send + Sync {
    /// Memory in use, in bytes.
    fn sample(&self) -> u64;
}

/// Samples the resident set size through `sysinfo`.
pub struct ProcessMemorySampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl std::fmt::Debug for ProcessMemorySampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessMemorySampler")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl Default for ProcessMemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMemorySampler {
    /// Creates a sampler for the current process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl MemorySampler for ProcessMemorySampler {
    fn sample(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).map_or(0, sysinfo::Process::memory)
    }
}

/// Whether `memory` is above `limit`; a zero limit disables the ceiling.
#[must_use]
pub fn exceeds(memory: u64, limit: u64) -> bool {
    limit > 0 && memory > limit
}
