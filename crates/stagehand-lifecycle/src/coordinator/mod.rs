//! Start-once orchestration keyed by configuration fingerprints.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use tracing::{debug, info, warn};

use crate::LIFECYCLE_TARGET;
use crate::config::ResourceConfig;
use crate::driver::ResourceDriver;
use crate::error::LifecycleError;
use crate::locks::LockRegistry;
use crate::store::FingerprintStore;

/// File extension of per-kind state files.
const FINGERPRINT_EXTENSION: &str = "fingerprint";

/// What [`Lifecycle::ensure_started`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The recorded configuration matched; the driver was not called.
    Unchanged,
    /// Nothing was recorded; the resource was started.
    Started,
    /// A different configuration was recorded; it was stopped and the new
    /// one started.
    Restarted,
}

/// Coordinates drivers against fingerprints kept under one state directory.
///
/// The coordinator is the only writer of fingerprint files. Drivers own the
/// external side effects and never see the state directory.
#[derive(Debug)]
pub struct Lifecycle {
    state_dir: PathBuf,
    locks: Arc<LockRegistry>,
}

impl Lifecycle {
    /// Creates a coordinator storing fingerprints beneath `state_dir`.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self::with_locks(state_dir, Arc::new(LockRegistry::new()))
    }

    /// Creates a coordinator sharing an existing lock registry.
    #[must_use]
    pub fn with_locks(state_dir: impl Into<PathBuf>, locks: Arc<LockRegistry>) -> Self {
        Self {
            state_dir: state_dir.into(),
            locks,
        }
    }

    /// Directory holding the fingerprint files.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Store backing `driver`'s fingerprint.
    #[must_use]
    pub fn store_for<D: ResourceDriver + ?Sized>(&self, driver: &D) -> FingerprintStore {
        FingerprintStore::new(
            self.state_dir
                .join(format!("{}.{FINGERPRINT_EXTENSION}", driver.kind())),
        )
    }

    /// Starts the resource for `config` unless that exact configuration is
    /// already recorded.
    ///
    /// When a different configuration is recorded, its fingerprint is
    /// deleted and the old resource stopped before the new one starts. The
    /// new fingerprint is written only after `start` succeeds, so a failed
    /// start leaves nothing recorded and the next call starts again.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Serialization`] when `config` cannot be
    /// fingerprinted, [`LifecycleError::Stop`] or [`LifecycleError::Start`]
    /// when the driver fails, and a state error when the fingerprint file
    /// cannot be read, removed or written.
    pub fn ensure_started<D: ResourceDriver + ?Sized>(
        &self,
        driver: &D,
        config: &D::Config,
    ) -> Result<Transition, LifecycleError> {
        let kind = driver.kind();
        let required = config
            .fingerprint()
            .map_err(|source| LifecycleError::Serialization {
                kind,
                source: Arc::new(source),
            })?;

        let lock = self.locks.lock_for(kind);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let store = self.store_for(driver);
        let transition = match store.read()? {
            Some(recorded) if recorded == required => {
                debug!(target: LIFECYCLE_TARGET, kind, "configuration unchanged");
                return Ok(Transition::Unchanged);
            }
            Some(recorded) => match D::Config::from_fingerprint(&recorded) {
                Ok(previous) => {
                    store.delete()?;
                    info!(target: LIFECYCLE_TARGET, kind, "configuration changed; stopping previous");
                    driver
                        .stop(&previous)
                        .map_err(|source| LifecycleError::Stop { kind, source })?;
                    Transition::Restarted
                }
                Err(error) => {
                    store.delete()?;
                    warn!(
                        target: LIFECYCLE_TARGET,
                        kind,
                        file = %store.path().display(),
                        error = %error,
                        "discarding unreadable fingerprint; previous resource not stopped"
                    );
                    Transition::Started
                }
            },
            None => Transition::Started,
        };

        info!(target: LIFECYCLE_TARGET, kind, "starting");
        driver
            .start(config)
            .map_err(|source| LifecycleError::Start { kind, source })?;
        store.write(&required)?;
        info!(target: LIFECYCLE_TARGET, kind, ?transition, "started");
        Ok(transition)
    }

    /// Ensures the resource is started, then resolves its handle.
    ///
    /// # Errors
    ///
    /// Returns any [`Self::ensure_started`] error, or
    /// [`LifecycleError::Handle`] when the driver cannot resolve the handle.
    pub fn ensure_ready<D: ResourceDriver + ?Sized>(
        &self,
        driver: &D,
        config: &D::Config,
    ) -> Result<D::Handle, LifecycleError> {
        self.ensure_started(driver, config)?;
        driver.handle(config).map_err(|source| LifecycleError::Handle {
            kind: driver.kind(),
            source,
        })
    }

    /// Tears down the resource for `config` whatever is recorded.
    ///
    /// Stop failures are logged and swallowed: an unreachable control plane
    /// at debug level, anything else at warn. The fingerprint is deleted
    /// afterwards in every case.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StateRemove`] when the fingerprint file
    /// exists but cannot be removed.
    pub fn force_stop<D: ResourceDriver + ?Sized>(
        &self,
        driver: &D,
        config: &D::Config,
    ) -> Result<(), LifecycleError> {
        let kind = driver.kind();
        let lock = self.locks.lock_for(kind);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        match driver.stop(config) {
            Ok(()) => info!(target: LIFECYCLE_TARGET, kind, "stopped"),
            Err(error) if error.is_connectivity() => {
                debug!(target: LIFECYCLE_TARGET, kind, error = %error, "stop skipped; not reachable");
            }
            Err(error) => {
                warn!(target: LIFECYCLE_TARGET, kind, error = %error, "stop failed; continuing");
            }
        }
        self.store_for(driver).delete()?;
        Ok(())
    }

    /// Decodes the recorded configuration for `driver`, if any.
    ///
    /// # Errors
    ///
    /// Returns a state read error, or [`LifecycleError::Serialization`] when
    /// the recorded bytes do not decode.
    pub fn recorded<D: ResourceDriver + ?Sized>(
        &self,
        driver: &D,
    ) -> Result<Option<D::Config>, LifecycleError> {
        let kind = driver.kind();
        let Some(fingerprint) = self.store_for(driver).read()? else {
            return Ok(None);
        };
        D::Config::from_fingerprint(&fingerprint)
            .map(Some)
            .map_err(|source| LifecycleError::Serialization {
                kind,
                source: Arc::new(source),
            })
    }
}
