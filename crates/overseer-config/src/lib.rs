//! Configuration for the overseer process supervisor.
//!
//! Settings arrive from three layers. Command-line flags win over
//! environment variables, which win over the YAML file named by `--config`,
//! which wins over the built-in defaults in [`defaults`]. The YAML file also
//! carries the daemon tree: every daemon spec, its workers, and the free-form
//! parameters handed down to them.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod defaults;
mod logging;
mod settings;
mod spec;

pub use defaults::{
    DEFAULT_CONFIG_PATH, DEFAULT_DAEMON, DEFAULT_LOG_FILTER, DEFAULT_PID_DIR, default_log_format,
};
pub use logging::{ControlSignal, LogFormat};
pub use settings::{Command, Settings};
pub use spec::{DaemonSpec, Params, RunAs, WorkerSpec};

/// Errors raised while assembling the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command-line parsing failed or asked for help/version output.
    #[error(transparent)]
    Cli(#[from] clap::Error),
    /// The configuration file could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        /// File that failed to open.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The configuration file is not valid YAML for the expected shape.
    #[error("failed to decode configuration file '{path}': {message}")]
    Decode {
        /// File that failed to decode.
        path: Utf8PathBuf,
        /// Decoder diagnostic.
        message: String,
    },
}

/// Contents of the YAML configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    /// Directory holding pid files.
    #[serde(default)]
    pub pid_dir: Option<Utf8PathBuf>,
    /// Log filter expression.
    #[serde(default)]
    pub log_filter: Option<String>,
    /// Log output format.
    #[serde(default)]
    pub log_format: Option<LogFormat>,
    /// Daemon specs keyed by name.
    #[serde(default)]
    pub daemons: BTreeMap<String, DaemonSpec>,
}

impl ConfigFile {
    /// Decodes a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, String> {
        serde_saphyr::from_str(text).map_err(|error| error.to_string())
    }

    /// Reads and decodes the file at `path`.
    pub fn read(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|message| ConfigError::Decode {
            path: path.to_path_buf(),
            message,
        })
    }
}

/// Resolved configuration shared by every role of the binary.
#[derive(Debug, Clone, Default)]
pub struct Config {
    settings: Settings,
    file: ConfigFile,
}

impl Config {
    /// Loads settings from the process arguments and the file they name.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads settings from an explicit argument list.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let settings = Settings::try_parse_from(args)?;
        let file = ConfigFile::read(&settings.config_path)?;
        Ok(Self::from_parts(settings, file))
    }

    /// Combines already-parsed layers, naming each daemon after its key.
    #[must_use]
    pub fn from_parts(settings: Settings, mut file: ConfigFile) -> Self {
        for (name, daemon) in &mut file.daemons {
            daemon.name.clone_from(name);
        }
        Self { settings, file }
    }

    /// Command-line and environment settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Directory holding pid files.
    #[must_use]
    pub fn pid_dir(&self) -> Utf8PathBuf {
        self.settings
            .pid_dir
            .clone()
            .or_else(|| self.file.pid_dir.clone())
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_PID_DIR))
    }

    /// Looks up a daemon spec by name.
    #[must_use]
    pub fn daemon(&self, name: &str) -> Option<&DaemonSpec> {
        self.file.daemons.get(name)
    }

    /// All daemon specs keyed by name.
    #[must_use]
    pub fn daemons(&self) -> &BTreeMap<String, DaemonSpec> {
        &self.file.daemons
    }

    /// Daemon role selected for this process.
    #[must_use]
    pub fn selected_daemon(&self) -> &str {
        &self.settings.daemon
    }

    /// Worker selected for in-process execution, if any.
    #[must_use]
    pub fn selected_worker(&self) -> Option<&str> {
        self.settings.worker.as_deref()
    }

    /// Whether debug logging was requested.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.settings.debug
    }

    /// Effective log filter; `--debug` overrides every other layer.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        if self.settings.debug {
            return defaults::DEBUG_LOG_FILTER;
        }
        self.settings
            .log_filter
            .as_deref()
            .or(self.file.log_filter.as_deref())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Effective log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.settings
            .log_format
            .or(self.file.log_format)
            .unwrap_or_else(default_log_format)
    }
}
