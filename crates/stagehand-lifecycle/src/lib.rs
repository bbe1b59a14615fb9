//! Idempotent lifecycle management for expensive external resources.
//!
//! A resource (a database container, an installed toolchain) is described by
//! a [`ResourceConfig`] value. The [`Lifecycle`] coordinator starts the
//! resource through its [`ResourceDriver`] at most once per distinct
//! configuration: it records a canonical [`Fingerprint`] of the configuration
//! that was last started, short-circuits when the caller asks for the same
//! configuration again, and stops the old resource before starting a new one
//! when the configuration changes.
//!
//! # Concurrency
//!
//! The coordinator serialises calls for the same driver kind with an
//! in-process [`LockRegistry`]. Two independent processes operating on the
//! same state directory are not coordinated; the tooling targets a single
//! local build per project at a time.
//!
//! # Example
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use stagehand_lifecycle::{DriverError, Lifecycle, ResourceConfig, ResourceDriver};
//!
//! #[derive(Serialize, Deserialize)]
//! struct CacheConfig {
//!     version: String,
//! }
//!
//! impl ResourceConfig for CacheConfig {}
//!
//! struct CacheDriver;
//!
//! impl ResourceDriver for CacheDriver {
//!     type Config = CacheConfig;
//!     type Handle = u16;
//!
//!     fn kind(&self) -> &'static str {
//!         "cache"
//!     }
//!     fn start(&self, _config: &CacheConfig) -> Result<(), DriverError> {
//!         Ok(())
//!     }
//!     fn stop(&self, _config: &CacheConfig) -> Result<(), DriverError> {
//!         Ok(())
//!     }
//!     fn handle(&self, _config: &CacheConfig) -> Result<u16, DriverError> {
//!         Ok(6379)
//!     }
//! }
//!
//! let lifecycle = Lifecycle::new("build/stagehand");
//! let config = CacheConfig { version: "7.2".into() };
//! let port = lifecycle.ensure_ready(&CacheDriver, &config).expect("cache ready");
//! assert_eq!(port, 6379);
//! ```

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod locks;
pub mod retry;
pub mod store;

#[cfg(test)]
mod tests;

pub use self::config::{Fingerprint, ResourceConfig};
pub use self::coordinator::{Lifecycle, Transition};
pub use self::driver::{DriverError, ErrorKind, ResourceDriver};
pub use self::error::LifecycleError;
pub use self::locks::LockRegistry;
pub use self::retry::{RetryPolicy, RetryWindow};
pub use self::store::FingerprintStore;

/// Tracing target for lifecycle coordination.
pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::coordinator");
