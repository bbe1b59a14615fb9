//! Subprocess execution with concurrent output capture.
//!
//! The `stagehand-process` crate runs external commands on behalf of the
//! resource drivers. Every invocation drains stdout and stderr on two
//! dedicated reader threads while the caller blocks on the child's exit, so a
//! command that fills one pipe buffer while the other stream is idle can
//! never deadlock the parent. Output is captured line by line and kept in
//! full; it is only surfaced when the command fails.
//!
//! # Example
//!
//! ```rust,no_run
//! use stagehand_process::{CommandRunner, CommandSpec, SystemRunner};
//!
//! let spec = CommandSpec::new("docker")
//!     .arg("info")
//!     .env("DOCKER_CLI_HINTS", "false");
//! let output = SystemRunner::new().run(&spec).expect("docker is reachable");
//! assert!(output.success());
//! ```

mod capture;
pub mod command;
pub mod error;
pub mod output;
pub mod runner;

#[cfg(test)]
mod tests;

pub use self::command::CommandSpec;
pub use self::error::{ProcessError, ProcessFailure};
pub use self::output::ProcessOutput;
pub use self::runner::{CommandRunner, SystemRunner};

/// Tracing target for subprocess operations.
pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runner");
