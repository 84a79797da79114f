//! Exclusive pid files guarded by an advisory `flock`.
//!
//! A pid file names one process slot. Holding the lock on its descriptor is
//! what makes a process the owner of the slot; the decimal pid inside is only
//! a hint for third parties and must be confirmed with a liveness probe.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{debug, warn};

pub(crate) const PIDFILE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pidfile");

/// Attempts made when the path is replaced between `open` and `flock`.
const RELINK_ATTEMPTS: usize = 3;

/// Errors raised by pid file operations.
#[derive(Debug, Error)]
pub enum PidFileError {
    /// Another live descriptor holds the lock.
    #[error("pid file '{path}' is locked by another process")]
    AlreadyRunning {
        /// Contended pid file.
        path: PathBuf,
        /// Pid recorded in the file, when readable.
        pid: Option<Pid>,
    },
    /// No file exists at the path.
    #[error("pid file '{path}' does not exist")]
    NotFound {
        /// Missing pid file.
        path: PathBuf,
    },
    /// The file does not hold a positive decimal pid.
    #[error("pid file '{path}' holds malformed content {content:?}")]
    Malformed {
        /// Offending pid file.
        path: PathBuf,
        /// Raw file content.
        content: String,
    },
    /// A filesystem call failed.
    #[error("pid file operation on '{path}' failed: {source}")]
    Io {
        /// Pid file being accessed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl PidFileError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A held pid file. Dropping it releases the slot.
pub struct PidFile {
    path: PathBuf,
    file: Option<Flock<File>>,
}

impl fmt::Debug for PidFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PidFile")
            .field("path", &self.path)
            .field("held", &self.is_held())
            .finish()
    }
}

impl PidFile {
    /// Claims the slot at `path` and writes the current pid into it.
    ///
    /// The file is created with `mode` when absent. When another descriptor
    /// holds the lock the file is left untouched and `AlreadyRunning` is
    /// returned.
    pub fn create(path: impl Into<PathBuf>, mode: u32) -> Result<Self, PidFileError> {
        let path = path.into();
        let Some(mut file) = lock_path(&path, mode)? else {
            let pid = Self::read(&path).ok();
            return Err(PidFileError::AlreadyRunning { path, pid });
        };
        write_pid(&mut file, Pid::this()).map_err(PidFileError::io(&path))?;
        debug!(
            target: PIDFILE_TARGET,
            file = %path.display(),
            pid = Pid::this().as_raw(),
            "pid file claimed"
        );
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Reads the pid recorded at `path` without claiming the slot.
    pub fn read(path: &Path) -> Result<Pid, PidFileError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(PidFileError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => return Err(PidFileError::io(path)(source)),
        };
        parse_pid(&content).ok_or_else(|| PidFileError::Malformed {
            path: path.to_path_buf(),
            content,
        })
    }

    /// Records `pid` at `path` under a transient lock.
    ///
    /// Used by a parent right after spawning a child so the slot reflects the
    /// child before the child claims it. Returns `false` when another holder
    /// owns the lock, in which case nothing is written.
    pub fn record(path: &Path, pid: Pid, mode: u32) -> Result<bool, PidFileError> {
        let Some(mut file) = lock_path(path, mode)? else {
            return Ok(false);
        };
        write_pid(&mut file, pid).map_err(PidFileError::io(path))?;
        Ok(true)
    }

    /// Deletes the file and releases the lock. A second call is a no-op.
    pub fn remove(&mut self) -> Result<(), PidFileError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        // Unlink while still locked so no other process can claim an inode
        // that is about to disappear.
        let result = match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PidFileError::io(&self.path)(source)),
        };
        drop(file);
        debug!(
            target: PIDFILE_TARGET,
            file = %self.path.display(),
            "pid file released"
        );
        result
    }

    /// Path of the slot.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lock is still held.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(error) = self.remove() {
            warn!(
                target: PIDFILE_TARGET,
                error = %error,
                "failed to release pid file on drop"
            );
        }
    }
}

/// Opens `path` and takes the lock. `None` means the lock is contended.
fn lock_path(path: &Path, mode: u32) -> Result<Option<Flock<File>>, PidFileError> {
    for _ in 0..RELINK_ATTEMPTS {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(mode)
            .open(path)
            .map_err(PidFileError::io(path))?;
        let Some(locked) = try_flock_exclusive(file).map_err(PidFileError::io(path))? else {
            return Ok(None);
        };
        // A previous holder may have unlinked the path between our open and
        // our lock; in that case the lock guards a dead inode.
        if still_linked(path, &locked).map_err(PidFileError::io(path))? {
            return Ok(Some(locked));
        }
    }
    Err(PidFileError::Io {
        path: path.to_path_buf(),
        source: io::Error::other("pid file was replaced while locking"),
    })
}

fn try_flock_exclusive(file: File) -> io::Result<Option<Flock<File>>> {
    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(locked) => Ok(Some(locked)),
        Err((_, Errno::EWOULDBLOCK)) => Ok(None),
        Err((_, errno)) => Err(io::Error::from(errno)),
    }
}

fn still_linked(path: &Path, file: &File) -> io::Result<bool> {
    let on_disk = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    let held = file.metadata()?;
    Ok(on_disk.dev() == held.dev() && on_disk.ino() == held.ino())
}

fn write_pid(file: &mut File, pid: Pid) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(pid.as_raw().to_string().as_bytes())?;
    file.sync_all()
}

fn parse_pid(content: &str) -> Option<Pid> {
    let raw: i32 = content.trim().parse().ok()?;
    (raw > 0).then(|| Pid::from_raw(raw))
}
