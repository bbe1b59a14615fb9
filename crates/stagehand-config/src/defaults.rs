//! Default values shared by the loader and the accessors.

use crate::logging::LogFormat;

/// Log filter used when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// State directory relative to the work directory.
pub const DEFAULT_STATE_DIR: &str = "build/stagehand";

/// Compose file relative to the work directory.
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Service running Postgres inside the compose project.
pub const DEFAULT_COMPOSE_SERVICE: &str = "postgres";

/// Flyway migrations relative to the work directory.
pub const DEFAULT_MIGRATIONS_DIR: &str = "src/main/resources/db/migration";

/// Schema dump written after migrating.
pub const DEFAULT_SCHEMA_DUMP: &str = "build/schema.sql";

/// Connection parameters written for other build steps.
pub const DEFAULT_CONNECTION_FILE: &str = "build/pgConnection.properties";

/// Milliseconds of quiet retrying.
pub const DEFAULT_RETRY_SILENT_MS: u64 = 10_000;

/// Milliseconds after which retrying gives up.
pub const DEFAULT_RETRY_LOUD_MS: u64 = 12_000;

/// Milliseconds between attempts.
pub const DEFAULT_RETRY_POLL_MS: u64 = 100;

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default silent retry window.
#[must_use]
pub const fn default_retry_silent_ms() -> u64 {
    DEFAULT_RETRY_SILENT_MS
}

/// Default loud retry window.
#[must_use]
pub const fn default_retry_loud_ms() -> u64 {
    DEFAULT_RETRY_LOUD_MS
}

/// Default poll interval.
#[must_use]
pub const fn default_retry_poll_ms() -> u64 {
    DEFAULT_RETRY_POLL_MS
}
