//! Errors surfaced by the lifecycle coordinator.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::driver::DriverError;

/// Errors raised while ensuring or tearing down a resource.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The configuration could not be turned into a stable fingerprint.
    #[error("failed to fingerprint {kind} configuration: {source}")]
    Serialization {
        /// Driver kind.
        kind: &'static str,
        /// Underlying encoding error.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// Reading the state file failed.
    #[error("failed to read state file '{path}': {source}")]
    StateRead {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Writing the state file failed.
    #[error("failed to write state file '{path}': {source}")]
    StateWrite {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Removing the state file failed.
    #[error("failed to remove state file '{path}': {source}")]
    StateRemove {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Stopping the previously recorded resource failed.
    #[error("failed to stop previous {kind}: {source}")]
    Stop {
        /// Driver kind.
        kind: &'static str,
        /// Driver failure.
        #[source]
        source: DriverError,
    },

    /// Starting the resource failed.
    #[error("failed to start {kind}: {source}")]
    Start {
        /// Driver kind.
        kind: &'static str,
        /// Driver failure.
        #[source]
        source: DriverError,
    },

    /// The resource started but its handle could not be resolved.
    #[error("failed to resolve {kind} handle: {source}")]
    Handle {
        /// Driver kind.
        kind: &'static str,
        /// Driver failure.
        #[source]
        source: DriverError,
    },
}

impl LifecycleError {
    /// The driver failure behind this error, if any.
    #[must_use]
    pub const fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Stop { source, .. } | Self::Start { source, .. } | Self::Handle { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    /// Whether a driver reported that its control plane is unreachable.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        self.driver_error().is_some_and(DriverError::is_connectivity)
    }
}
