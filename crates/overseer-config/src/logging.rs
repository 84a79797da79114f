use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output format for the daemon's structured logs.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, flattened for log shippers.
    #[default]
    Json,
    /// Single-line human-readable events.
    Compact,
}

/// Termination signals the `--signal` command can deliver to a running daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ControlSignal {
    /// `SIGTERM`.
    #[strum(to_string = "term", serialize = "sigterm")]
    Term,
    /// `SIGQUIT`.
    #[strum(to_string = "quit", serialize = "sigquit")]
    Quit,
    /// `SIGINT`.
    #[strum(to_string = "int", serialize = "sigint")]
    Int,
}
