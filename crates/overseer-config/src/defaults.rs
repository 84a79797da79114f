//! Built-in defaults shared by the configuration loader and the daemon.

use std::time::Duration;

/// Configuration file read when neither `--config` nor `OVERSEER_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "overseer.yaml";

/// Directory holding pid files when neither flags nor the file name one.
pub const DEFAULT_PID_DIR: &str = "pids";

/// Daemon role assumed when `--daemon` is absent.
pub const DEFAULT_DAEMON: &str = "watcher";

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter forced by `--debug`.
pub const DEBUG_LOG_FILTER: &str = "debug";

/// Tick interval applied when a spec omits `sleep`.
pub const DEFAULT_SLEEP: Duration = Duration::from_secs(1);

/// Lower bound for any tick interval; a zero `sleep` would otherwise spin.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) fn default_sleep() -> Duration {
    DEFAULT_SLEEP
}

/// Default logging format for the binary.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
