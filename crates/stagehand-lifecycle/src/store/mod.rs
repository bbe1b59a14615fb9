//! On-disk record of the configuration that was last started.
//!
//! The store only touches the filesystem. Deciding when to delete the old
//! record relative to stopping the old resource is the coordinator's job.

use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use tempfile::Builder;
use tracing::debug;

use crate::LIFECYCLE_TARGET;
use crate::config::Fingerprint;
use crate::error::LifecycleError;

/// Reads, writes and deletes one fingerprint file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintStore {
    path: PathBuf,
}

impl FingerprintStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the fingerprint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the recorded fingerprint; a missing file means nothing has
    /// been started yet.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StateRead`] for failures other than the file
    /// or its directory being absent.
    pub fn read(&self) -> Result<Option<Fingerprint>, LifecycleError> {
        let read_error = |source| LifecycleError::StateRead {
            path: self.path.clone(),
            source: Arc::new(source),
        };
        let (parent, name) = self.split().map_err(read_error)?;
        let Some(dir) = open_optional_dir(parent).map_err(read_error)? else {
            return Ok(None);
        };
        match dir.read(name) {
            Ok(bytes) => Ok(Some(Fingerprint::from_bytes(bytes))),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(read_error(error)),
        }
    }

    /// Records `fingerprint`, creating parent directories as needed.
    ///
    /// The bytes are written to a temporary sibling, synced, and renamed into
    /// place so a reader never observes a partial record.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StateWrite`] when any step fails.
    pub fn write(&self, fingerprint: &Fingerprint) -> Result<(), LifecycleError> {
        atomic_write(&self.path, fingerprint.as_bytes()).map_err(|source| {
            LifecycleError::StateWrite {
                path: self.path.clone(),
                source: Arc::new(source),
            }
        })?;
        debug!(
            target: LIFECYCLE_TARGET,
            file = %self.path.display(),
            bytes = fingerprint.as_bytes().len(),
            "fingerprint recorded"
        );
        Ok(())
    }

    /// Removes the record. Returns whether a file was actually removed.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StateRemove`] for failures other than the
    /// file being absent.
    pub fn delete(&self) -> Result<bool, LifecycleError> {
        let remove_error = |source| LifecycleError::StateRemove {
            path: self.path.clone(),
            source: Arc::new(source),
        };
        let (parent, name) = self.split().map_err(remove_error)?;
        let Some(dir) = open_optional_dir(parent).map_err(remove_error)? else {
            return Ok(false);
        };
        match dir.remove_file(name) {
            Ok(()) => {
                debug!(
                    target: LIFECYCLE_TARGET,
                    file = %self.path.display(),
                    "fingerprint removed"
                );
                Ok(true)
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(remove_error(error)),
        }
    }

    fn split(&self) -> io::Result<(&Path, &OsStr)> {
        let name = self.path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "state path does not name a file",
            )
        })?;
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Ok((parent, name))
    }
}

fn open_optional_dir(path: &Path) -> io::Result<Option<Dir>> {
    match Dir::open_ambient_dir(path, ambient_authority()) {
        Ok(dir) => Ok(Some(dir)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("stagehand"),
    );
    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
