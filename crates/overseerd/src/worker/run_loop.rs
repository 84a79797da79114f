//! One tick of the worker run loop.
//!
//! Memory is checked before every fetch, so a fetched batch is always
//! processed. Hook failures are logged and the tick carries on; only
//! termination ends the fetch cycle early.

use std::time::Instant;

use tracing::{debug, warn};

use crate::runtime::Runtime;

use super::{ResultProcess, WORKER_TARGET, Worker, WorkerError, exceeds};

/// Runs one tick and returns its accumulated result.
pub(crate) fn tick(worker: &dyn Worker, runtime: &Runtime) -> ResultProcess {
    let spec = &worker.data().spec;
    let limit = spec.memory_limit;
    let started = Instant::now();
    let mut outcome = ResultProcess::new(spec.queue.clone());

    let mut memory = runtime.sampler().sample();
    log_hook(worker, "before_run", worker.before_run());

    while runtime.termination().is_running() {
        if exceeds(memory, limit) {
            outcome.backpressure = true;
            runtime.reporter().backpressure(&spec.name, memory, limit);
            break;
        }
        let mut batch = match worker.get_entities() {
            Ok(Some(batch)) => batch,
            Ok(None) => break,
            Err(error) => {
                log_hook(worker, "get_entities", Err(error));
                break;
            }
        };

        let mut step = ResultProcess::new(spec.queue.clone());
        log_hook(worker, "before_processing", worker.before_processing(&mut batch));
        if !batch.is_empty() {
            step.total = batch.len();
            log_hook(worker, "processing", worker.processing(&batch, &mut step));
        }
        for failed in &step.error_items {
            debug!(
                target: WORKER_TARGET,
                worker = %spec.name,
                ids = ?worker.extract_id(&failed.item),
                message = %failed.message,
                "item failed"
            );
        }
        log_hook(
            worker,
            "after_processing",
            worker.after_processing(&step.error_items),
        );
        outcome.absorb(step);
        memory = runtime.sampler().sample();
    }

    outcome.duration = started.elapsed();
    outcome.memory = runtime.sampler().sample();
    log_hook(worker, "after_run", worker.after_run(&outcome));
    outcome
}

fn log_hook(worker: &dyn Worker, hook: &'static str, result: Result<(), WorkerError>) {
    if let Err(error) = result {
        warn!(
            target: WORKER_TARGET,
            worker = %worker.data().spec.name,
            hook,
            error = %error,
            "worker hook failed"
        );
    }
}
