//! Worker counts reported by `--status`.

use std::collections::BTreeMap;

use overseer_config::DaemonSpec;
use serde::Serialize;

use crate::registry::WATCHER_KIND;
use crate::runtime::Runtime;
use crate::worker::new_worker;

use super::new_daemon;

/// Live and configured worker counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Count {
    /// Workers whose pid answers the liveness probe.
    pub current: usize,
    /// Workers that are enabled and constructible.
    pub total: usize,
}

/// Status of one daemon.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaemonStatus {
    /// Worker counts.
    pub count: Count,
}

/// Status keyed by daemon name.
pub type StatusReport = BTreeMap<String, DaemonStatus>;

/// Reports the daemon `name`, or every daemon it supervises when it is a
/// watcher. Unknown or disabled daemons are left out.
#[must_use]
pub fn daemons_status(runtime: &Runtime, name: &str) -> StatusReport {
    let mut report = StatusReport::new();
    let Some(daemon) = new_daemon(runtime, name) else {
        return report;
    };
    let spec = &daemon.data().spec;
    if spec.kind() == WATCHER_KIND {
        for child in spec.enabled_workers() {
            if let Some(supervised) = new_daemon(runtime, &child.name) {
                let data = supervised.data();
                report.insert(data.spec.name.clone(), workers_status(runtime, &data.spec));
            }
        }
    } else {
        report.insert(spec.name.clone(), workers_status(runtime, spec));
    }
    report
}

fn workers_status(runtime: &Runtime, spec: &DaemonSpec) -> DaemonStatus {
    let mut count = Count::default();
    for worker in spec
        .workers
        .iter()
        .filter_map(|worker| new_worker(runtime, worker, &spec.name, &spec.params))
    {
        count.total += 1;
        if worker.status() {
            count.current += 1;
        }
    }
    DaemonStatus { count }
}
