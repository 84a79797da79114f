//! Built-in worker that drains JSON documents from a spool directory.
//!
//! Each worker reads `<spool-dir>/<queue>/*.json` in name order. Processed
//! files are deleted; files that do not parse are moved to `failed/` beside
//! them and reported as error items.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::process::Role;
use crate::registry::ConfigDecodeError;
use crate::worker::{
    Batch, ErrorItem, Item, ResultProcess, WORKER_TARGET, Worker, WorkerData, WorkerError,
};

const DEFAULT_BATCH_SIZE: usize = 10;
const FAILED_DIR: &str = "failed";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SpoolParams {
    spool_dir: PathBuf,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Drains one spool queue per worker.
#[derive(Debug, Default)]
pub struct SpoolWorker {
    data: WorkerData,
    queue_dir: PathBuf,
    batch_size: usize,
    stuck: Mutex<BTreeSet<PathBuf>>,
}

impl SpoolWorker {
    /// Directory this worker drains.
    #[must_use]
    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    fn stuck(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        self.stuck.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queued documents not yet settled this tick. Items carry their path as
    /// a string, so names that are not UTF-8 never become items: they are
    /// quarantined, or parked for the rest of the tick when that fails.
    fn pending(&self) -> io::Result<Vec<PathBuf>> {
        let mut stuck = self.stuck();
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.queue_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if !path.is_file() || stuck.contains(&path) {
                continue;
            }
            if path.to_str().is_none() {
                self.set_aside(&path, &mut stuck);
                continue;
            }
            files.push(path);
        }
        files.sort();
        files.truncate(self.batch_size);
        Ok(files)
    }

    fn settle(&self, item: &Item) -> Result<(), String> {
        let Some(path) = item.get("path").and_then(Value::as_str).map(PathBuf::from) else {
            return Err("item has no path".to_owned());
        };
        let outcome = match item.get("error").and_then(Value::as_str) {
            Some(_) => self.quarantine(&path),
            None => fs::remove_file(&path),
        };
        outcome.map_err(|error| {
            self.stuck().insert(path.clone());
            format!("failed to settle '{}': {error}", path.display())
        })
    }

    fn set_aside(&self, path: &Path, stuck: &mut BTreeSet<PathBuf>) {
        match self.quarantine(path) {
            Ok(()) => warn!(
                target: WORKER_TARGET,
                worker = %self.data.spec.name,
                file = %path.display(),
                "file name is not UTF-8; moved to failed/"
            ),
            Err(error) => {
                warn!(
                    target: WORKER_TARGET,
                    worker = %self.data.spec.name,
                    file = %path.display(),
                    error = %error,
                    "file name is not UTF-8; left in place"
                );
                stuck.insert(path.to_path_buf());
            }
        }
    }

    fn quarantine(&self, path: &Path) -> io::Result<()> {
        let failed = self.queue_dir.join(FAILED_DIR);
        fs::create_dir_all(&failed)?;
        let Some(file_name) = path.file_name() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "no file name"));
        };
        fs::rename(path, failed.join(file_name))
    }
}

fn load(path: &Path) -> Item {
    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let location = path.to_str().unwrap_or_default();
    let parsed = fs::read_to_string(path)
        .map_err(|error| error.to_string())
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|error| error.to_string()));
    match parsed {
        Ok(payload) => json!({ "id": id, "path": location, "payload": payload }),
        Err(error) => json!({ "id": id, "path": location, "error": error }),
    }
}

impl Worker for SpoolWorker {
    fn data(&self) -> &WorkerData {
        &self.data
    }

    fn set_data(&mut self, data: WorkerData) -> Result<(), ConfigDecodeError> {
        let decode_error = |message: String| ConfigDecodeError {
            role: Role::Worker,
            name: data.spec.name.clone(),
            message,
        };
        let object = Value::Object(data.params.clone().into_iter().collect());
        let params: SpoolParams =
            serde_json::from_value(object).map_err(|error| decode_error(error.to_string()))?;
        if params.batch_size == 0 {
            return Err(decode_error("batch-size must be positive".to_owned()));
        }
        let queue = if data.spec.queue.is_empty() {
            data.spec.name.as_str()
        } else {
            data.spec.queue.as_str()
        };
        self.queue_dir = params.spool_dir.join(queue);
        self.batch_size = params.batch_size;
        self.data = data;
        Ok(())
    }

    fn before_run(&self) -> Result<(), WorkerError> {
        self.stuck().clear();
        Ok(())
    }

    fn after_run(&self, result: &ResultProcess) -> Result<(), WorkerError> {
        if !result.is_idle() {
            info!(
                target: WORKER_TARGET,
                worker = %self.data.spec.name,
                queue = %result.queue,
                total = result.total,
                failed = result.error_items.len(),
                batches = result.iterations,
                elapsed_ms = result.duration.as_millis(),
                "spool drained"
            );
        }
        Ok(())
    }

    fn processing(&self, batch: &[Item], result: &mut ResultProcess) -> Result<(), WorkerError> {
        for item in batch {
            if let Some(error) = item.get("error").and_then(Value::as_str) {
                result
                    .error_items
                    .push(ErrorItem::new(item.clone(), format!("malformed document: {error}")));
            }
            if let Err(message) = self.settle(item) {
                result.error_items.push(ErrorItem::new(item.clone(), message));
            }
        }
        Ok(())
    }

    fn get_entities(&self) -> Result<Option<Batch>, WorkerError> {
        let files = match self.pending() {
            Ok(files) => files,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(
                    target: WORKER_TARGET,
                    worker = %self.data.spec.name,
                    dir = %self.queue_dir.display(),
                    "spool directory missing"
                );
                return Ok(None);
            }
            Err(error) => {
                return Err(WorkerError::with_source(
                    format!("failed to list '{}'", self.queue_dir.display()),
                    error,
                ));
            }
        };
        if files.is_empty() {
            return Ok(None);
        }
        Ok(Some(files.iter().map(|path| load(path)).collect()))
    }

    fn extract_id(&self, item: &Item) -> Vec<String> {
        item.get("id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use overseer_config::{Params, WorkerSpec};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn spool() -> TempDir {
        TempDir::new().expect("create spool dir")
    }

    fn worker(spool: &TempDir, batch_size: usize) -> SpoolWorker {
        let mut spec = WorkerSpec::new("orders");
        spec.queue = "incoming".to_owned();
        let mut params = Params::new();
        params.insert("spool-dir".to_owned(), json!(spool.path()));
        params.insert("batch-size".to_owned(), json!(batch_size));
        let mut worker = SpoolWorker::default();
        worker
            .set_data(WorkerData {
                spec,
                parent: "import".to_owned(),
                params,
                ..WorkerData::default()
            })
            .expect("decode params");
        worker
    }

    fn enqueue(spool: &TempDir, name: &str, body: &str) -> PathBuf {
        let dir = spool.path().join("incoming");
        fs::create_dir_all(&dir).expect("create queue dir");
        let path = dir.join(name);
        fs::write(&path, body).expect("write document");
        path
    }

    #[rstest]
    fn missing_queue_directory_means_no_work(spool: TempDir) {
        let worker = worker(&spool, 10);
        assert!(worker.get_entities().expect("list").is_none());
    }

    #[rstest]
    fn batches_are_bounded_and_ordered(spool: TempDir) {
        for name in ["c.json", "a.json", "b.json", "notes.txt"] {
            enqueue(&spool, name, "{}");
        }
        let worker = worker(&spool, 2);

        let batch = worker.get_entities().expect("list").expect("work pending");
        let ids: Vec<_> = batch.iter().flat_map(|item| worker.extract_id(item)).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[rstest]
    fn processing_deletes_valid_and_quarantines_malformed_documents(spool: TempDir) {
        let valid = enqueue(&spool, "1.json", r#"{"order": 7}"#);
        let broken = enqueue(&spool, "2.json", "{not json");
        let worker = worker(&spool, 10);

        let batch = worker.get_entities().expect("list").expect("work pending");
        let mut result = ResultProcess::new("incoming");
        worker.processing(&batch, &mut result).expect("process");

        assert!(!valid.exists());
        assert!(!broken.exists());
        assert!(spool.path().join("incoming/failed/2.json").exists());
        assert_eq!(result.error_items.len(), 1);
        assert_eq!(worker.extract_id(&result.error_items[0].item), ["2"]);
        assert!(worker.get_entities().expect("list").is_none());
    }

    #[rstest]
    fn queue_defaults_to_the_worker_name(spool: TempDir) {
        let mut params = Params::new();
        params.insert("spool-dir".to_owned(), json!(spool.path()));
        let mut worker = SpoolWorker::default();
        worker
            .set_data(WorkerData {
                spec: WorkerSpec::new("refunds"),
                params,
                ..WorkerData::default()
            })
            .expect("decode params");

        assert_eq!(worker.queue_dir(), spool.path().join("refunds"));
    }

    #[rstest]
    #[case::missing_spool_dir(json!({}))]
    #[case::zero_batch(json!({"spool-dir": "/tmp", "batch-size": 0}))]
    #[case::wrong_type(json!({"spool-dir": "/tmp", "batch-size": "many"}))]
    fn invalid_params_are_rejected(#[case] params: Value) {
        let Value::Object(map) = params else {
            panic!("params must be an object");
        };
        let mut worker = SpoolWorker::default();
        let error = worker
            .set_data(WorkerData {
                spec: WorkerSpec::new("orders"),
                params: map.into_iter().collect(),
                ..WorkerData::default()
            })
            .expect_err("params are invalid");
        assert_eq!(error.role, Role::Worker);
        assert_eq!(error.name, "orders");
    }

    #[rstest]
    fn idle_ticks_are_not_logged_as_drained(spool: TempDir) {
        let worker = worker(&spool, 10);
        let mut result = ResultProcess::new("incoming");
        result.duration = Duration::from_millis(3);
        assert!(worker.after_run(&result).is_ok());
    }
}
