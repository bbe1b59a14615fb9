//! Layered configuration for the `stagehand` binary.
//!
//! Values merge defaults, an optional TOML file passed with `--config-path`,
//! `STAGEHAND_*` environment variables and command-line flags, in increasing
//! order of precedence. Relative paths are resolved against the work
//! directory so the same file works from any checkout location.

mod address;
mod defaults;
mod logging;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use address::{AddressParseError, DatabaseAddress};
pub use defaults::{
    DEFAULT_COMPOSE_FILE, DEFAULT_COMPOSE_SERVICE, DEFAULT_CONNECTION_FILE, DEFAULT_LOG_FILTER,
    DEFAULT_MIGRATIONS_DIR, DEFAULT_RETRY_LOUD_MS, DEFAULT_RETRY_POLL_MS, DEFAULT_RETRY_SILENT_MS,
    DEFAULT_SCHEMA_DUMP, DEFAULT_STATE_DIR, default_log_filter, default_log_format,
    default_retry_loud_ms, default_retry_poll_ms, default_retry_silent_ms,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Errors raised while interpreting loaded values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `external_database` is not a `host:port` pair.
    #[error("invalid external_database setting: {0}")]
    ExternalDatabase(#[source] AddressParseError),
}

/// Settings shared by every `stagehand` command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "STAGEHAND")]
pub struct Config {
    /// Project root; relative paths below resolve against it.
    #[serde(default)]
    pub work_dir: Option<Utf8PathBuf>,
    /// Directory holding fingerprint files.
    #[serde(default)]
    pub state_dir: Option<Utf8PathBuf>,
    /// `tracing` filter directive.
    #[serde(default = "default_log_filter")]
    #[ortho_config(default = default_log_filter())]
    pub log_filter: String,
    /// Output format for log events.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Milliseconds of quiet retrying before failures are logged.
    #[serde(default = "default_retry_silent_ms")]
    #[ortho_config(default = DEFAULT_RETRY_SILENT_MS)]
    pub retry_silent_ms: u64,
    /// Milliseconds after which a retried operation gives up.
    #[serde(default = "default_retry_loud_ms")]
    #[ortho_config(default = DEFAULT_RETRY_LOUD_MS)]
    pub retry_loud_ms: u64,
    /// Milliseconds between retry attempts.
    #[serde(default = "default_retry_poll_ms")]
    #[ortho_config(default = DEFAULT_RETRY_POLL_MS)]
    pub retry_poll_ms: u64,
    /// Compose file declaring the database service.
    #[serde(default)]
    pub compose_file: Option<Utf8PathBuf>,
    /// Name of the database service in the compose file.
    #[serde(default)]
    pub compose_service: Option<String>,
    /// Flyway migrations directory.
    #[serde(default)]
    pub migrations_dir: Option<Utf8PathBuf>,
    /// Where the schema dump is written.
    #[serde(default)]
    pub schema_dump: Option<Utf8PathBuf>,
    /// Where connection parameters are written.
    #[serde(default)]
    pub connection_file: Option<Utf8PathBuf>,
    /// Reuse local images instead of pulling on every start.
    #[serde(default)]
    pub skip_pull: bool,
    /// `host:port` of a database provided outside the container engine.
    #[serde(default)]
    pub external_database: Option<String>,
    /// Node.js install directory, relative to the work directory.
    #[serde(default)]
    pub node_install_dir: Option<Utf8PathBuf>,
    /// npm release to pin, or `provided` for the bundled one.
    #[serde(default)]
    pub npm_version: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: None,
            state_dir: None,
            log_filter: default_log_filter(),
            log_format: default_log_format(),
            retry_silent_ms: DEFAULT_RETRY_SILENT_MS,
            retry_loud_ms: DEFAULT_RETRY_LOUD_MS,
            retry_poll_ms: DEFAULT_RETRY_POLL_MS,
            compose_file: None,
            compose_service: None,
            migrations_dir: None,
            schema_dump: None,
            connection_file: None,
            skip_pull: false,
            external_database: None,
            node_install_dir: None,
            npm_version: None,
        }
    }
}

impl Config {
    /// Project root, `.` when unset.
    #[must_use]
    pub fn work_dir(&self) -> &Utf8Path {
        self.work_dir
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new("."))
    }

    /// Joins `path` onto the work directory unless it is already absolute.
    #[must_use]
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir().join(path)
        }
    }

    fn resolve_or(&self, value: Option<&Utf8Path>, fallback: &str) -> Utf8PathBuf {
        self.resolve(value.unwrap_or_else(|| Utf8Path::new(fallback)))
    }

    /// Fingerprint directory, `<work_dir>/build/stagehand` by default.
    #[must_use]
    pub fn state_dir(&self) -> Utf8PathBuf {
        self.resolve_or(self.state_dir.as_deref(), DEFAULT_STATE_DIR)
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Quiet retry window.
    #[must_use]
    pub const fn retry_silent(&self) -> Duration {
        Duration::from_millis(self.retry_silent_ms)
    }

    /// Total retry window.
    #[must_use]
    pub const fn retry_loud(&self) -> Duration {
        Duration::from_millis(self.retry_loud_ms)
    }

    /// Delay between attempts.
    #[must_use]
    pub const fn retry_poll(&self) -> Duration {
        Duration::from_millis(self.retry_poll_ms)
    }

    /// Resolved compose file.
    #[must_use]
    pub fn compose_file(&self) -> Utf8PathBuf {
        self.resolve_or(self.compose_file.as_deref(), DEFAULT_COMPOSE_FILE)
    }

    /// Database service name.
    #[must_use]
    pub fn compose_service(&self) -> &str {
        self.compose_service
            .as_deref()
            .unwrap_or(DEFAULT_COMPOSE_SERVICE)
    }

    /// Resolved migrations directory.
    #[must_use]
    pub fn migrations_dir(&self) -> Utf8PathBuf {
        self.resolve_or(self.migrations_dir.as_deref(), DEFAULT_MIGRATIONS_DIR)
    }

    /// Resolved schema dump path.
    #[must_use]
    pub fn schema_dump(&self) -> Utf8PathBuf {
        self.resolve_or(self.schema_dump.as_deref(), DEFAULT_SCHEMA_DUMP)
    }

    /// Resolved connection file path.
    #[must_use]
    pub fn connection_file(&self) -> Utf8PathBuf {
        self.resolve_or(self.connection_file.as_deref(), DEFAULT_CONNECTION_FILE)
    }

    /// Whether images are only pulled when missing.
    #[must_use]
    pub const fn skip_pull(&self) -> bool {
        self.skip_pull
    }

    /// Parsed external database address, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ExternalDatabase`] when the value is not a
    /// `host:port` pair.
    pub fn external_database(&self) -> Result<Option<DatabaseAddress>, ConfigError> {
        self.external_database
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(str::parse)
            .transpose()
            .map_err(ConfigError::ExternalDatabase)
    }

    /// Configured Node.js install directory, unresolved.
    #[must_use]
    pub fn node_install_dir(&self) -> Option<&Utf8Path> {
        self.node_install_dir.as_deref()
    }

    /// npm selection, `provided` when unset.
    #[must_use]
    pub fn npm_version(&self) -> &str {
        self.npm_version.as_deref().unwrap_or("provided")
    }
}
