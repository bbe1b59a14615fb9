//! Command-line grammar for `stagehand`.

use clap::{Parser, Subcommand};

/// Starts development dependencies at most once per configuration.
#[derive(Parser, Debug)]
#[command(name = "stagehand", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Resource families managed by the CLI.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Manages the development database.
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Manages the pinned Node.js toolchain.
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
}

/// Database actions.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DbAction {
    /// Starts and migrates the database unless it is already current.
    Up,
    /// Tears the database down and forgets the recorded configuration.
    Down,
    /// Reports whether a configuration is recorded.
    Status,
}

/// Node.js actions.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeAction {
    /// Installs Node.js and runs `npm ci` unless already current.
    Install,
    /// Runs an npm script with the pinned toolchain.
    Run {
        /// Script name from `package.json`.
        script: String,
        /// Extra environment variable for the script.
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
    },
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
