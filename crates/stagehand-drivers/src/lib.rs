//! Resource drivers for the stagehand lifecycle coordinator.
//!
//! Two drivers are provided:
//!
//! - [`PostgresDriver`] brings up a Postgres container through Docker
//!   Compose (or adopts an externally provided database), applies Flyway
//!   migrations and dumps the resulting schema.
//! - [`NodeDriver`] installs a pinned Node.js distribution and runs
//!   `npm ci` against the project's lockfile.
//!
//! Both shell out through a [`stagehand_process::CommandRunner`], so tests
//! substitute a scripted runner and assert on the exact command lines.

pub mod digest;
pub mod node;
pub mod postgres;

#[cfg(test)]
mod test_support;

pub use self::node::{NodeConfig, NodeDriver, NodeToolchain, NpmVersion};
pub use self::postgres::{
    ComposeService, ConnectionParams, Credentials, ExternalDatabase, PostgresConfig,
    PostgresDriver, PostgresMode, PullPolicy,
};

/// Tracing target for driver operations.
pub(crate) const DRIVERS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::driver");
