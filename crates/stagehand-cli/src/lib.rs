//! Command-line runtime for `stagehand`.
//!
//! The runtime splits configuration flags from command tokens, loads layered
//! configuration, installs telemetry and dispatches to the database and
//! Node.js commands. Output streams are injected so tests can capture them.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;
use stagehand_config::ConfigError;
use stagehand_lifecycle::{DriverError, LifecycleError};
use stagehand_process::ProcessError;
use thiserror::Error;

mod cli;
mod commands;
mod config;
pub mod telemetry;

use cli::Cli;
use commands::Workspace;
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use telemetry::TelemetryError;

/// Tracing target for CLI events.
pub(crate) const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cli");

/// Runs the CLI using the provided arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

fn run_with_loader<I, W, E, L>(args: I, stdout: &mut W, stderr: &mut E, loader: &L) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let split = split_config_arguments(args.into_iter().collect());
    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(error) if is_informational(&error) => {
            return match write!(stdout, "{error}") {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            };
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| {
            telemetry::initialise(&config)?;
            Workspace::from_config(&config)
        })
        .and_then(|workspace| workspace.execute(&cli.command, stdout));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(stderr, &error),
    }
}

fn is_informational(error: &clap::Error) -> bool {
    matches!(
        error.kind(),
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
    )
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    writeln!(stderr, "stagehand: {error}").ok();
    ExitCode::FAILURE
}

#[derive(Debug, Error)]
enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to resolve work directory '{path}': {source}")]
    WorkDir { path: Utf8PathBuf, source: io::Error },
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("failed to write output: {0}")]
    Output(io::Error),
}

#[cfg(test)]
mod tests;
