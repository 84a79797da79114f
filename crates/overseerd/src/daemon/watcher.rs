use nix::sys::signal::Signal;

use crate::registry::ConfigDecodeError;
use crate::runtime::Runtime;
use crate::supervisor;

use super::{Daemon, DaemonData, DaemonError, new_daemon, release};

/// Keeps the daemons listed under its `workers` alive.
#[derive(Debug, Default)]
pub struct Watcher {
    data: DaemonData,
}

impl Watcher {
    fn children(&self, runtime: &Runtime) -> Vec<Box<dyn Daemon>> {
        self.data
            .spec
            .enabled_workers()
            .filter_map(|child| new_daemon(runtime, &child.name))
            .collect()
    }
}

impl Daemon for Watcher {
    fn data(&self) -> &DaemonData {
        &self.data
    }

    fn set_data(&mut self, data: DaemonData) -> Result<(), ConfigDecodeError> {
        self.data = data;
        Ok(())
    }

    fn run(&self, runtime: &Runtime) -> Result<(), DaemonError> {
        let children = self.children(runtime);
        supervisor::tick(runtime, &self.data.spec.name, &children)
    }

    fn terminate(&self, runtime: &Runtime, signal: Signal) {
        let children = self.children(runtime);
        supervisor::forward_signal(runtime, &self.data.spec.name, signal, &children);
        release(&self.data);
    }
}
