//! Configuration loading helpers for the CLI.
//!
//! Configuration flags must precede the command tokens. The leading run of
//! recognised flags is handed to `ortho_config`; everything from the first
//! other token onwards goes to the command parser.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use stagehand_config::Config;

use crate::AppError;

/// Flags taking a value, recognised by the configuration loader.
///
/// Keep in sync with the fields of [`Config`].
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--work-dir",
    "--state-dir",
    "--log-filter",
    "--log-format",
    "--retry-silent-ms",
    "--retry-loud-ms",
    "--retry-poll-ms",
    "--compose-file",
    "--compose-service",
    "--migrations-dir",
    "--schema-dump",
    "--connection-file",
    "--external-database",
    "--node-install-dir",
    "--npm-version",
];

/// Boolean configuration flags that never take a separate value.
const CONFIG_CLI_SWITCHES: &[&str] = &["--skip-pull"];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the leading configuration flags.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let (flag, has_inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (&*text, false),
    };
    if CONFIG_CLI_SWITCHES.contains(&flag) {
        return FlagAction::Include { needs_value: false };
    }
    if CONFIG_CLI_FLAGS.contains(&flag) {
        return FlagAction::Include {
            needs_value: !has_inline_value,
        };
    }
    FlagAction::Stop
}

/// Arguments separated for the loader and the command parser.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by the configuration flags.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name followed by the command tokens.
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: Vec<OsString>) -> ConfigArgumentSplit {
    let mut remaining = args.into_iter();
    let Some(program) = remaining.next() else {
        return ConfigArgumentSplit::default();
    };

    let mut config_arguments = vec![program.clone()];
    let mut command_arguments = vec![program];
    let mut expecting_value = false;
    for argument in remaining.by_ref() {
        if expecting_value {
            config_arguments.push(argument);
            expecting_value = false;
            continue;
        }
        match classify(&argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument);
                expecting_value = needs_value;
            }
            FlagAction::Stop => {
                command_arguments.push(argument);
                break;
            }
        }
    }
    command_arguments.extend(remaining);

    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
