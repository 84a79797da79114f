//! Pid file naming and directory preparation.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use super::errors::ProcessError;

/// `<pid-dir>/<name>.pid`
#[must_use]
pub fn daemon_pid_path(pid_dir: &Path, daemon: &str) -> PathBuf {
    pid_dir.join(format!("{daemon}.pid"))
}

/// `<pid-dir>/<parent>_<name>.pid`
#[must_use]
pub fn worker_pid_path(pid_dir: &Path, parent: &str, worker: &str) -> PathBuf {
    pid_dir.join(format!("{parent}_{worker}.pid"))
}

/// Resolves `path` against the current directory without touching the
/// filesystem.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf, ProcessError> {
    std::path::absolute(path).map_err(|source| ProcessError::PidPath {
        path: path.to_path_buf(),
        source,
    })
}

/// Creates the directory that will hold `pid_path`, if needed.
pub(crate) fn ensure_pid_directory(pid_path: &Path) -> Result<(), ProcessError> {
    let Some(dir) = pid_path.parent() else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)
        .map_err(|source| ProcessError::PidDirectory {
            path: dir.to_path_buf(),
            source,
        })
}
