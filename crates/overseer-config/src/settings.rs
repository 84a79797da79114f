use camino::Utf8PathBuf;
use clap::Parser;

use crate::defaults::{DEFAULT_CONFIG_PATH, DEFAULT_DAEMON};
use crate::logging::{ControlSignal, LogFormat};

/// Process-wide settings read from the command line and environment.
///
/// The same binary plays every role. `--daemon` and `--worker` select the
/// role at startup and are rewritten when a parent re-invokes the binary
/// for a child.
#[derive(Debug, Clone, Parser, PartialEq, Eq)]
#[command(name = "overseerd", version, about = "Pid-file guarded process supervisor")]
pub struct Settings {
    /// YAML file describing daemons and workers.
    #[arg(
        short = 'c',
        long = "config",
        env = "OVERSEER_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config_path: Utf8PathBuf,
    /// Directory holding pid files.
    #[arg(short = 'p', long = "pid-dir", env = "OVERSEER_PID_DIR")]
    pub pid_dir: Option<Utf8PathBuf>,
    /// Daemon role to assume.
    #[arg(short = 'd', long = "daemon", default_value = DEFAULT_DAEMON)]
    pub daemon: String,
    /// Worker to run in-process under the selected daemon.
    #[arg(short = 'w', long = "worker")]
    pub worker: Option<String>,
    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
    /// Run one-shot migrations; never forwarded to children.
    #[arg(long)]
    pub migrate: bool,
    /// Log filter expression, e.g. `info,overseerd::supervisor=debug`.
    #[arg(long = "log-filter", env = "OVERSEER_LOG_FILTER")]
    pub log_filter: Option<String>,
    /// Log output format.
    #[arg(long = "log-format", env = "OVERSEER_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    /// Print worker counts for the selected daemon as JSON and exit.
    #[arg(long, conflicts_with = "signal")]
    pub status: bool,
    /// Deliver a termination signal to the selected daemon and exit.
    #[arg(long, value_name = "SIGNAL")]
    pub signal: Option<ControlSignal>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: Utf8PathBuf::from(DEFAULT_CONFIG_PATH),
            pid_dir: None,
            daemon: DEFAULT_DAEMON.to_owned(),
            worker: None,
            debug: false,
            migrate: false,
            log_filter: None,
            log_format: None,
            status: false,
            signal: None,
        }
    }
}

/// What the invocation asks the binary to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Supervise or run the selected role.
    Run,
    /// Report worker counts.
    Status,
    /// Signal the running instance of the selected daemon.
    Signal(ControlSignal),
}

impl Settings {
    /// Resolves the command implied by the one-shot flags.
    #[must_use]
    pub fn command(&self) -> Command {
        match (self.status, self.signal) {
            (true, _) => Command::Status,
            (false, Some(signal)) => Command::Signal(signal),
            (false, None) => Command::Run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_the_watcher() {
        let settings = Settings::parse_from(["overseerd"]);
        assert_eq!(settings.daemon, "watcher");
        assert_eq!(settings.worker, None);
        assert_eq!(settings.command(), Command::Run);
    }

    #[test]
    fn parses_role_selectors_in_both_forms() {
        let settings = Settings::parse_from(["overseerd", "--daemon=import", "-w", "sync"]);
        assert_eq!(settings.daemon, "import");
        assert_eq!(settings.worker.as_deref(), Some("sync"));
    }

    #[test]
    fn signal_flag_selects_signal_command() {
        let settings = Settings::parse_from(["overseerd", "--signal", "quit"]);
        assert_eq!(settings.command(), Command::Signal(ControlSignal::Quit));
    }

    #[test]
    fn status_conflicts_with_signal() {
        let result = Settings::try_parse_from(["overseerd", "--status", "--signal", "term"]);
        assert!(result.is_err());
    }
}
