//! Maps the host platform onto Node.js distribution names.

use stagehand_lifecycle::DriverError;

/// Operating system and architecture labels used in dist archive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    os: &'static str,
    arch: &'static str,
}

impl Platform {
    /// Uses explicit labels, for example `("linux", "x64")`.
    #[must_use]
    pub const fn new(os: &'static str, arch: &'static str) -> Self {
        Self { os, arch }
    }

    /// Detects the platform this binary runs on.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Configuration`] for platforms without a
    /// `.tar.gz` Node.js distribution.
    pub fn current() -> Result<Self, DriverError> {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Translates Rust's `OS` and `ARCH` constants.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Configuration`] for unsupported combinations.
    pub fn from_rust(os: &str, arch: &str) -> Result<Self, DriverError> {
        let node_os = match os {
            "linux" => "linux",
            "macos" => "darwin",
            "aix" => "aix",
            other => {
                return Err(DriverError::configuration(format!(
                    "no Node.js tarball is published for {other}"
                )));
            }
        };
        let node_arch = match arch {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            "arm" => "armv7l",
            "powerpc64" => "ppc64le",
            "s390x" => "s390x",
            other => {
                return Err(DriverError::configuration(format!(
                    "no Node.js tarball is published for {os}/{other}"
                )));
            }
        };
        Ok(Self::new(node_os, node_arch))
    }

    /// Operating system label.
    #[must_use]
    pub const fn os(&self) -> &'static str {
        self.os
    }

    /// Architecture label.
    #[must_use]
    pub const fn arch(&self) -> &'static str {
        self.arch
    }

    /// Archive file name for `version`, for example
    /// `node-v20.11.1-linux-x64.tar.gz`.
    #[must_use]
    pub fn archive_name(&self, version: &str) -> String {
        format!("node-{version}-{}-{}.tar.gz", self.os, self.arch)
    }
}
