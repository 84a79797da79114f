//! Scripted worker and memory doubles.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use nix::sys::signal::Signal;

use crate::registry::{ConfigDecodeError, Registries};
use crate::worker::{
    Batch, ErrorItem, Item, MemorySampler, ResultProcess, Worker, WorkerData, WorkerError,
};

/// Worker kind registered by [`test_registries`].
pub const PROBE_KIND: &str = "probe";

/// Built-in kinds plus [`PROBE_KIND`].
#[must_use]
pub fn test_registries() -> Registries {
    let mut registries = Registries::builtin();
    registries
        .workers
        .register(PROBE_KIND, || Box::new(ScriptedWorker::default()));
    registries
}

/// Hook invocation counters.
#[derive(Debug, Default)]
pub struct Calls {
    pub before_run: AtomicUsize,
    pub after_run: AtomicUsize,
    pub get_entities: AtomicUsize,
    pub processing: AtomicUsize,
    pub after_processing: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Worker that replays queued batches and records every hook call.
#[derive(Debug, Default)]
pub struct ScriptedWorker {
    pub data: WorkerData,
    pub calls: Calls,
    batches: Mutex<VecDeque<Result<Batch, String>>>,
    reject: Mutex<Vec<Item>>,
    failed_seen: Mutex<Vec<ErrorItem>>,
    results: Mutex<Vec<ResultProcess>>,
    terminated: Mutex<Vec<Signal>>,
}

impl ScriptedWorker {
    /// Worker whose attached data is `data`.
    #[must_use]
    pub fn with_data(data: WorkerData) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Queues a batch for a later `get_entities` call.
    pub fn push_batch(&self, batch: Batch) {
        self.batches
            .lock()
            .expect("batches poisoned")
            .push_back(Ok(batch));
    }

    /// Queues a fetch failure.
    pub fn push_failure(&self, message: &str) {
        self.batches
            .lock()
            .expect("batches poisoned")
            .push_back(Err(message.to_owned()));
    }

    /// Items `processing` will report as failed.
    pub fn reject(&self, item: Item) {
        self.reject.lock().expect("reject poisoned").push(item);
    }

    /// Error items passed to `after_processing`.
    pub fn failed_seen(&self) -> Vec<ErrorItem> {
        self.failed_seen.lock().expect("failed poisoned").clone()
    }

    /// Results passed to `after_run`.
    pub fn results(&self) -> Vec<ResultProcess> {
        self.results.lock().expect("results poisoned").clone()
    }

    /// Signals passed to `terminate`.
    pub fn terminated(&self) -> Vec<Signal> {
        self.terminated.lock().expect("terminated poisoned").clone()
    }
}

impl Worker for ScriptedWorker {
    fn data(&self) -> &WorkerData {
        &self.data
    }

    fn set_data(&mut self, data: WorkerData) -> Result<(), ConfigDecodeError> {
        self.data = data;
        Ok(())
    }

    fn before_run(&self) -> Result<(), WorkerError> {
        Calls::bump(&self.calls.before_run);
        Ok(())
    }

    fn after_run(&self, result: &ResultProcess) -> Result<(), WorkerError> {
        Calls::bump(&self.calls.after_run);
        self.results
            .lock()
            .expect("results poisoned")
            .push(result.clone());
        Ok(())
    }

    fn processing(&self, batch: &[Item], result: &mut ResultProcess) -> Result<(), WorkerError> {
        Calls::bump(&self.calls.processing);
        let reject = self.reject.lock().expect("reject poisoned");
        for item in batch.iter().filter(|item| reject.contains(item)) {
            result
                .error_items
                .push(ErrorItem::new(item.clone(), "rejected"));
        }
        Ok(())
    }

    fn after_processing(&self, errors: &[ErrorItem]) -> Result<(), WorkerError> {
        Calls::bump(&self.calls.after_processing);
        self.failed_seen
            .lock()
            .expect("failed poisoned")
            .extend_from_slice(errors);
        Ok(())
    }

    fn get_entities(&self) -> Result<Option<Batch>, WorkerError> {
        Calls::bump(&self.calls.get_entities);
        match self.batches.lock().expect("batches poisoned").pop_front() {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(message)) => Err(WorkerError::new(message)),
            None => Ok(None),
        }
    }

    fn extract_id(&self, item: &Item) -> Vec<String> {
        vec![item.to_string()]
    }

    fn terminate(&self, signal: Signal) {
        self.terminated
            .lock()
            .expect("terminated poisoned")
            .push(signal);
    }
}

/// Sampler that replays queued figures, then repeats the last one.
#[derive(Debug, Default)]
pub struct FixedMemory {
    bytes: AtomicU64,
    queued: Mutex<VecDeque<u64>>,
}

impl FixedMemory {
    #[must_use]
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes: AtomicU64::new(bytes),
            queued: Mutex::default(),
        }
    }

    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::SeqCst);
    }

    /// Samples returned, in order, before the figure settles.
    pub fn queue(&self, samples: &[u64]) {
        self.queued
            .lock()
            .expect("samples poisoned")
            .extend(samples.iter().copied());
    }
}

impl MemorySampler for FixedMemory {
    fn sample(&self) -> u64 {
        if let Some(next) = self.queued.lock().expect("samples poisoned").pop_front() {
            self.set(next);
        }
        self.bytes.load(Ordering::SeqCst)
    }
}
