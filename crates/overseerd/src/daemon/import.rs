use nix::sys::signal::Signal;

use crate::registry::ConfigDecodeError;
use crate::runtime::Runtime;
use crate::supervisor;
use crate::worker::{Worker, new_worker};

use super::{Daemon, DaemonData, DaemonError, release};

/// Keeps its import workers alive. Workers inherit the daemon's `params`.
#[derive(Debug, Default)]
pub struct Import {
    data: DaemonData,
}

impl Import {
    fn children(&self, runtime: &Runtime) -> Vec<Box<dyn Worker>> {
        let spec = &self.data.spec;
        spec.enabled_workers()
            .filter_map(|worker| new_worker(runtime, worker, &spec.name, &spec.params))
            .collect()
    }
}

impl Daemon for Import {
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
