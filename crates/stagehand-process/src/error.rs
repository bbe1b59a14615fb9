//! Errors raised while running subprocesses.
//!
//! I/O errors are wrapped in `Arc` and the non-zero exit report is boxed so
//! the error stays small enough to satisfy the `result_large_err` lint.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::output::ProcessOutput;

/// Errors arising from subprocess execution.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// The executable could not be located.
    #[error("failed to run `{command}`: executable not found")]
    ProgramNotFound {
        /// Rendered command line.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The child process could not be spawned.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Output capture could not be set up or waiting for exit failed.
    #[error("failed to supervise `{command}`: {message}")]
    Supervise {
        /// Rendered command line.
        command: String,
        /// What went wrong.
        message: String,
        /// Underlying I/O error, if any.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// The child exited with a non-zero status or was killed by a signal.
    #[error("{0}")]
    NonZeroExit(Box<ProcessFailure>),
}

impl ProcessError {
    /// Returns the failure report when the child ran but did not succeed.
    #[must_use]
    pub fn failure(&self) -> Option<&ProcessFailure> {
        match self {
            Self::NonZeroExit(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether the executable itself was missing.
    #[must_use]
    pub const fn is_program_not_found(&self) -> bool {
        matches!(self, Self::ProgramNotFound { .. })
    }
}

/// Full report of a command that ran to completion but failed.
///
/// The rendered message lists the command line, every explicitly supplied
/// environment variable, the exit status, then the complete stdout transcript
/// followed by the complete stderr transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    command: String,
    environment: BTreeMap<String, String>,
    output: ProcessOutput,
}

impl ProcessFailure {
    /// Builds a failure report.
    #[must_use]
    pub const fn new(
        command: String,
        environment: BTreeMap<String, String>,
        output: ProcessOutput,
    ) -> Self {
        Self {
            command,
            environment,
            output,
        }
    }

    /// Rendered command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Environment variables supplied for the invocation.
    #[must_use]
    pub const fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Exit code, or `None` after signal termination.
    #[must_use]
    pub const fn status(&self) -> Option<i32> {
        self.output.status()
    }

    /// Captured transcript.
    #[must_use]
    pub const fn output(&self) -> &ProcessOutput {
        &self.output
    }
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.output.status() {
            Some(code) => writeln!(f, "`{}` exited with status {code}", self.command)?,
            None => writeln!(f, "`{}` was terminated by a signal", self.command)?,
        }
        if !self.environment.is_empty() {
            writeln!(f, "environment:")?;
            for (key, value) in &self.environment {
                writeln!(f, "  {key}={value}")?;
            }
        }
        writeln!(f, "stdout:")?;
        for line in self.output.stdout() {
            writeln!(f, "  {line}")?;
        }
        write!(f, "stderr:")?;
        for line in self.output.stderr() {
            write!(f, "\n  {line}")?;
        }
        Ok(())
    }
}
