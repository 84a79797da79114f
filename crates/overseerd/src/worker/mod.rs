//! Worker handles and the batch-processing run loop.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::path::Path;

use nix::sys::signal::Signal;
use overseer_config::{Params, WorkerSpec};
use thiserror::Error;
use tracing::{error, info};

use crate::process::lifecycle::{self, Exit};
use crate::process::{
    HANDLE_PID_PERM, ProcessContext, Role, StartupError, paths, respawn_arguments,
};
use crate::registry::ConfigDecodeError;
use crate::runtime::Runtime;

mod memory;
mod result;
pub(crate) mod run_loop;

pub use memory::{MemorySampler, ProcessMemorySampler, exceeds};
pub use result::{ErrorItem, ResultProcess};

pub(crate) const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::worker");

/// One unit of work.
pub type Item = serde_json::Value;
/// Items fetched together by [`Worker::get_entities`].
pub type Batch = Vec<Item>;

/// Failure reported by a worker hook. Always logged, never fatal.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct WorkerError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl WorkerError {
    /// Error with a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Error wrapping an underlying cause.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Configuration and identity attached to a worker handle.
#[derive(Debug, Default)]
pub struct WorkerData {
    /// Worker settings.
    pub spec: WorkerSpec,
    /// Name of the daemon that supervises this worker.
    pub parent: String,
    /// Parameters inherited from the parent daemon.
    pub params: Params,
    /// Process slot of the worker.
    pub context: ProcessContext,
}

/// Capability set of a worker kind.
///
/// Hooks run on the tick thread; `terminate` runs on the signal listener
/// thread. Hooks that keep state need interior mutability.
pub trait Worker: Send + Sync {
    /// Attached configuration.
    fn data(&self) -> &WorkerData;

    /// Attaches configuration; rejects parameters the kind cannot decode.
    fn set_data(&mut self, data: WorkerData) -> Result<(), ConfigDecodeError>;

    /// Runs at the start of every tick.
    fn before_run(&self) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Runs at the end of every tick with the tick's result.
    fn after_run(&self, result: &ResultProcess) -> Result<(), WorkerError> {
        let _ = result;
        Ok(())
    }

    /// Runs before each fetched batch; may rewrite or empty it.
    fn before_processing(&self, batch: &mut Batch) -> Result<(), WorkerError> {
        let _ = batch;
        Ok(())
    }

    /// Processes a non-empty batch, recording failures in `result`.
    fn processing(&self, batch: &[Item], result: &mut ResultProcess) -> Result<(), WorkerError>;

    /// Runs after each batch with the items that failed.
    fn after_processing(&self, errors: &[ErrorItem]) -> Result<(), WorkerError> {
        let _ = errors;
        Ok(())
    }

    /// Fetches the next batch; `None` when there is no more work this tick.
    fn get_entities(&self) -> Result<Option<Batch>, WorkerError>;

    /// Identifiers carried by `item`, for logging.
    fn extract_id(&self, item: &Item) -> Vec<String>;

    /// Whether the worker process is alive.
    fn status(&self) -> bool {
        self.data().context.status()
    }

    /// Called once when termination begins.
    fn terminate(&self, signal: Signal) {
        let _ = signal;
    }
}

/// Builds a worker handle for `spec` under `parent`.
///
/// Returns `None`, after logging, when the worker is disabled, its kind is
/// not registered, or its parameters do not decode.
pub fn new_worker(
    runtime: &Runtime,
    spec: &WorkerSpec,
    parent: &str,
    params: &Params,
) -> Option<Box<dyn Worker>> {
    if !spec.enabled {
        info!(target: WORKER_TARGET, worker = %spec.name, "worker is disabled");
        return None;
    }
    let Some(mut worker) = runtime.registries().workers.create(spec.kind()) else {
        error!(
            target: WORKER_TARGET,
            worker = %spec.name,
            kind = %spec.kind(),
            "no worker implementation registered"
        );
        return None;
    };

    let pid_dir = runtime.config().pid_dir();
    let pid_path = paths::worker_pid_path(pid_dir.as_std_path(), parent, &spec.name);
    let pid_path = match paths::absolute(&pid_path) {
        Ok(path) => path,
        Err(error) => {
            error!(target: WORKER_TARGET, worker = %spec.name, error = %error, "init worker");
            return None;
        }
    };
    let context = worker_context(runtime, spec, parent, &pid_path);

    let data = WorkerData {
        spec: spec.clone(),
        parent: parent.to_owned(),
        params: params.clone(),
        context,
    };
    if let Err(error) = worker.set_data(data) {
        error!(target: WORKER_TARGET, worker = %spec.name, error = %error, "init worker");
        return None;
    }
    Some(worker)
}

fn worker_context(
    runtime: &Runtime,
    spec: &WorkerSpec,
    parent: &str,
    pid_path: &Path,
) -> ProcessContext {
    let args = respawn_arguments(runtime.invocation_args(), parent, Some(&spec.name));
    ProcessContext::new(spec.name.clone(), Role::Worker)
        .with_pid_path(pid_path)
        .with_pid_perm(HANDLE_PID_PERM)
        .with_args(args)
        .with_run_as(spec.run_as)
        .with_work_dir(spec.work_dir.clone())
        .with_umask(spec.umask)
}

/// Runs `worker` in the current process until termination.
///
/// Claiming the pid file is fatal on failure. On a signal the worker's
/// `terminate` hook runs, then the pid file is released.
pub fn run(worker: &dyn Worker, runtime: &Runtime) -> Result<Exit, StartupError> {
    let data = worker.data();
    let name = data.spec.name.as_str();
    data.context
        .create_pid_file()
        .map_err(|source| StartupError::PidFile {
            role: Role::Worker,
            name: name.to_owned(),
            source,
        })?;
    info!(target: WORKER_TARGET, worker = name, parent = %data.parent, "worker started");

    let release = || {
        if let Err(error) = data.context.release() {
            error!(target: WORKER_TARGET, worker = name, error = %error, "worker terminate");
        }
    };
    let exit = lifecycle::drive(
        name,
        data.spec.interval(),
        runtime,
        |signal| {
            worker.terminate(signal);
            release();
        },
        || {
            run_loop::tick(worker, runtime);
            Ok::<(), Infallible>(())
        },
    );
    release();
    exit.map_err(StartupError::from)
}
