//! Structured telemetry initialisation for the CLI.

use std::borrow::Cow;
use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use stagehand_config::{Config, LogFormat};
use tracing::level_filters::LevelFilter;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Target prefix shared by every stagehand crate.
const STAGEHAND_TARGET_PREFIX: &str = "stagehand";

/// Level applied to other crates when the filter is a bare level.
const DEPENDENCY_LEVEL: LevelFilter = LevelFilter::WARN;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The global subscriber could not be installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on the first call; later calls do nothing.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or another
/// subscriber is already installed.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| ())
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(filter_directive(config.log_filter()).as_ref())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |env_filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_level(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

/// Scopes a bare level such as `debug` to stagehand's own events.
///
/// Anything other than a single level is passed through untouched, so full
/// `tracing` directives keep their usual meaning.
fn filter_directive(raw: &str) -> Cow<'_, str> {
    match raw.trim().parse::<LevelFilter>() {
        Ok(LevelFilter::OFF) => Cow::Borrowed("off"),
        Ok(level) if level > DEPENDENCY_LEVEL => {
            Cow::Owned(format!("{DEPENDENCY_LEVEL},{STAGEHAND_TARGET_PREFIX}={level}"))
        }
        Ok(level) => Cow::Owned(level.to_string()),
        Err(_) => Cow::Borrowed(raw),
    }
}
