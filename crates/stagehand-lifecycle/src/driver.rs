//! The contract every resource driver fulfils.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stagehand_process::ProcessError;
use thiserror::Error;

use crate::config::ResourceConfig;

/// Boxed error used as the cause of classified driver failures.
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Start and stop procedures for one kind of external resource.
///
/// The coordinator never calls `start` twice for the same recorded
/// configuration, but implementations should still tolerate it: a crash
/// between `start` and recording the fingerprint leaves the resource running
/// with nothing on disk.
pub trait ResourceDriver {
    /// Configuration that fully describes a running resource.
    type Config: ResourceConfig;
    /// Connectable handle available once `start` has completed.
    type Handle;

    /// Stable identifier used for locking and for the state file name.
    fn kind(&self) -> &'static str;

    /// Brings the resource up for `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] tagged with the failure's [`ErrorKind`].
    fn start(&self, config: &Self::Config) -> Result<(), DriverError>;

    /// Tears down the resource started for `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] tagged with the failure's [`ErrorKind`].
    fn stop(&self, config: &Self::Config) -> Result<(), DriverError>;

    /// Resolves how callers reach the running resource.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the handle cannot be determined.
    fn handle(&self, config: &Self::Config) -> Result<Self::Handle, DriverError>;
}

/// Classification of a driver failure, assigned where it is first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource's control plane could not be reached at all.
    Connectivity,
    /// The resource exists but cannot serve the operation yet.
    TransientUnavailable,
    /// A subprocess exited unsuccessfully.
    Process,
    /// A local filesystem operation failed.
    Io,
    /// The driver was given an unusable configuration.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connectivity => "connectivity",
            Self::TransientUnavailable => "transient-unavailable",
            Self::Process => "process",
            Self::Io => "io",
            Self::Configuration => "configuration",
        };
        f.write_str(label)
    }
}

/// Errors raised by resource drivers.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The control plane (for example the container engine) is unreachable.
    #[error("unable to reach {target}; is it running?")]
    Connectivity {
        /// What the driver tried to reach.
        target: String,
        /// Underlying failure, if one was observed.
        #[source]
        source: Option<BoxedCause>,
    },

    /// The resource is not ready to accept the operation yet.
    #[error("{target} is not ready: {message}")]
    Unavailable {
        /// What the driver waited for.
        target: String,
        /// Human-readable description.
        message: String,
        /// Underlying failure, if one was observed.
        #[source]
        source: Option<BoxedCause>,
    },

    /// A subprocess failed; carries the full transcript.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// A filesystem operation failed.
    #[error("failed to {action} '{path}': {source}")]
    Io {
        /// Operation that failed, for example "write".
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The configuration cannot be acted upon.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },
}

impl DriverError {
    /// Builds a connectivity error.
    pub fn connectivity(target: impl Into<String>, source: impl Into<BoxedCause>) -> Self {
        Self::Connectivity {
            target: target.into(),
            source: Some(source.into()),
        }
    }

    /// Builds a transient-unavailability error.
    pub fn unavailable(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            target: target.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Builds an I/O error for `path`.
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// Builds a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the failure classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connectivity { .. } => ErrorKind::Connectivity,
            Self::Unavailable { .. } => ErrorKind::TransientUnavailable,
            Self::Process(_) => ErrorKind::Process,
            Self::Io { .. } => ErrorKind::Io,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Whether the resource could not be reached at all.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connectivity)
    }
}
