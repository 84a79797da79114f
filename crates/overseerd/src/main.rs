//! Entrypoint for the `overseerd` supervisor.
//!
//! Loads configuration, installs telemetry, then runs whichever role the
//! command line selects.

use std::io::{self, Write};
use std::process::ExitCode;

use overseer_config::{Config, ConfigError};
use overseerd::RuntimeBuilder;

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::Cli(error)) => error.exit(),
        Err(error) => {
            writeln!(io::stderr().lock(), "overseerd: {error}").ok();
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = overseerd::initialise_telemetry(&config) {
        writeln!(io::stderr().lock(), "overseerd: {error}").ok();
        return ExitCode::FAILURE;
    }
    if config.settings().migrate {
        tracing::info!(target: "overseerd::launch", "no migrations are registered");
    }

    let runtime = RuntimeBuilder::new(config).build();
    match overseerd::run(&runtime) {
        Ok(exit) => exit.code(),
        Err(error) => {
            tracing::error!(target: "overseerd::launch", error = %error, "launch failed");
            ExitCode::FAILURE
        }
    }
}
