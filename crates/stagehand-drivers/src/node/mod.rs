//! Pinned Node.js installs with deterministic dependency installation.
//!
//! The toolchain version comes from `.nvmrc` and dependencies come from
//! `package-lock.json`; both are part of the configuration, so bumping
//! either reinstalls on the next run and nothing else does.

mod platform;
mod toolchain;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stagehand_lifecycle::{DriverError, ResourceConfig, ResourceDriver};
use stagehand_process::{CommandRunner, CommandSpec, SystemRunner};
use tracing::{debug, info};

pub use self::platform::Platform;
pub use self::toolchain::NodeToolchain;

use crate::DRIVERS_TARGET;
use crate::digest::hash_file;

/// Driver kind, used for locking and the fingerprint file name.
pub const NODE_KIND: &str = "node";

/// File naming the Node.js version.
pub const NVMRC: &str = ".nvmrc";

/// Lockfile whose hash is part of the configuration.
pub const PACKAGE_LOCK: &str = "package-lock.json";

/// Install directory used when none is configured, relative to the project.
pub const DEFAULT_INSTALL_DIR: &str = "build/node-install";

/// Default distribution mirror.
pub const NODE_DIST_URL: &str = "https://nodejs.org/dist";

/// Which npm to use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NpmVersion {
    /// Whatever npm ships with the Node.js distribution.
    #[default]
    Provided,
    /// A specific npm release installed over the bundled one.
    Pinned(String),
}

impl FromStr for NpmVersion {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == "provided" {
            Ok(Self::Provided)
        } else {
            Ok(Self::Pinned(trimmed.to_owned()))
        }
    }
}

impl fmt::Display for NpmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provided => f.write_str("provided"),
            Self::Pinned(version) => f.write_str(version),
        }
    }
}

/// Everything that determines the installed toolchain and dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    node_version: String,
    npm_version: NpmVersion,
    working_dir: PathBuf,
    install_dir: PathBuf,
    package_lock_sha256: String,
}

impl ResourceConfig for NodeConfig {}

impl NodeConfig {
    /// Reads the pinned version and lockfile hash for `project_dir`.
    ///
    /// `install_override` is resolved against the project; without it the
    /// toolchain goes to `build/node-install`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Configuration`] when no `.nvmrc` is found and
    /// [`DriverError::Io`] when a file cannot be read.
    pub fn discover(
        project_dir: &Path,
        install_override: Option<&Path>,
        npm_version: NpmVersion,
    ) -> Result<Self, DriverError> {
        let working_dir = std::path::absolute(project_dir)
            .map_err(|source| DriverError::io("resolve", project_dir, source))?;
        let node_version = nvmrc_version(&working_dir)?;
        let package_lock_sha256 = hash_file(&working_dir.join(PACKAGE_LOCK))?;
        let install_dir = install_override.map_or_else(
            || working_dir.join(DEFAULT_INSTALL_DIR),
            |dir| working_dir.join(dir),
        );
        Ok(Self {
            node_version,
            npm_version,
            working_dir,
            install_dir,
            package_lock_sha256,
        })
    }

    /// Node.js version including the leading `v`.
    #[must_use]
    pub fn node_version(&self) -> &str {
        &self.node_version
    }

    /// npm selection.
    #[must_use]
    pub const fn npm_version(&self) -> &NpmVersion {
        &self.npm_version
    }

    /// Project directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Where the distribution is unpacked.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// SHA-256 of `package-lock.json`.
    #[must_use]
    pub fn package_lock_sha256(&self) -> &str {
        &self.package_lock_sha256
    }

    /// Toolchain handle for this configuration.
    #[must_use]
    pub fn toolchain(&self) -> NodeToolchain {
        NodeToolchain::new(&self.install_dir, &self.working_dir)
    }
}

/// Reads `.nvmrc` from `project_dir` or its parent and returns the version
/// with a leading `v`.
///
/// # Errors
///
/// Returns [`DriverError::Configuration`] when neither directory holds a
/// non-empty `.nvmrc`, and [`DriverError::Io`] when one exists but cannot be
/// read.
pub fn nvmrc_version(project_dir: &Path) -> Result<String, DriverError> {
    let candidates = std::iter::once(project_dir).chain(project_dir.parent());
    for dir in candidates {
        let path = dir.join(NVMRC);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
            Err(error) => return Err(DriverError::io("read", &path, error)),
        };
        let version = contents.trim().trim_start_matches('v');
        if version.is_empty() {
            return Err(DriverError::configuration(format!(
                "{} is empty",
                path.display()
            )));
        }
        return Ok(format!("v{version}"));
    }
    Err(DriverError::configuration(format!(
        "could not find {NVMRC} in {} or its parent",
        project_dir.display()
    )))
}

/// Installs Node.js and runs `npm ci`.
#[derive(Debug, Clone)]
pub struct NodeDriver<R = SystemRunner> {
    runner: R,
    dist_url: String,
    curl: PathBuf,
    tar: PathBuf,
    platform: Option<Platform>,
}

impl Default for NodeDriver {
    fn default() -> Self {
        Self::new(SystemRunner::new())
    }
}

impl<R: CommandRunner> NodeDriver<R> {
    /// Creates a driver running commands through `runner`.
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            dist_url: NODE_DIST_URL.to_owned(),
            curl: PathBuf::from("curl"),
            tar: PathBuf::from("tar"),
            platform: None,
        }
    }

    /// Downloads distributions from `url` instead of nodejs.org.
    #[must_use]
    pub fn with_dist_url(mut self, url: impl Into<String>) -> Self {
        self.dist_url = url.into();
        self
    }

    /// Uses `platform` instead of detecting the host.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// The runner used for every command.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    fn platform(&self) -> Result<Platform, DriverError> {
        self.platform.map_or_else(Platform::current, Ok)
    }

    fn installed_version(&self, toolchain: &NodeToolchain) -> Option<String> {
        if !toolchain.node_program().is_file() {
            return None;
        }
        match self.runner.run(&toolchain.node(["--version"])) {
            Ok(output) => output.stdout().first().map(|line| line.trim().to_owned()),
            Err(error) => {
                debug!(target: DRIVERS_TARGET, error = %error, "installed node is unusable");
                None
            }
        }
    }

    fn install_node(&self, config: &NodeConfig) -> Result<(), DriverError> {
        let platform = self.platform()?;
        let archive_name = platform.archive_name(&config.node_version);
        let url = format!(
            "{}/{}/{archive_name}",
            self.dist_url.trim_end_matches('/'),
            config.node_version
        );
        let install_dir = &config.install_dir;

        match fs::remove_dir_all(install_dir) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(DriverError::io("remove", install_dir, error)),
        }
        fs::create_dir_all(install_dir)
            .map_err(|source| DriverError::io("create", install_dir, source))?;

        let archive = install_dir.join(&archive_name);
        info!(target: DRIVERS_TARGET, url = %url, "downloading node");
        self.runner.run(
            &CommandSpec::new(&self.curl)
                .args(["--fail", "--silent", "--show-error", "--location"])
                .arg("--output")
                .arg(archive.to_string_lossy())
                .arg(url),
        )?;
        self.runner.run(
            &CommandSpec::new(&self.tar)
                .arg("-xzf")
                .arg(archive.to_string_lossy())
                .arg("-C")
                .arg(install_dir.to_string_lossy())
                .arg("--strip-components=1"),
        )?;
        match fs::remove_file(&archive) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(DriverError::io("remove", &archive, error)),
        }
    }

    fn ensure_npm(&self, config: &NodeConfig, toolchain: &NodeToolchain) -> Result<(), DriverError> {
        let NpmVersion::Pinned(version) = &config.npm_version else {
            return Ok(());
        };
        let current = self
            .runner
            .run(&toolchain.npm(["--version"]))?
            .stdout()
            .first()
            .map(|line| line.trim().to_owned());
        if current.as_deref() == Some(version.as_str()) {
            return Ok(());
        }
        info!(target: DRIVERS_TARGET, version = %version, "installing pinned npm");
        let package = format!("npm@{version}");
        self.runner
            .run(&toolchain.npm(["install", "--global", package.as_str()]))?;
        Ok(())
    }
}

impl<R: CommandRunner> ResourceDriver for NodeDriver<R> {
    type Config = NodeConfig;
    type Handle = NodeToolchain;

    fn kind(&self) -> &'static str {
        NODE_KIND
    }

    fn start(&self, config: &NodeConfig) -> Result<(), DriverError> {
        let toolchain = config.toolchain();
        if self.installed_version(&toolchain).as_deref() == Some(config.node_version.as_str()) {
            debug!(
                target: DRIVERS_TARGET,
                version = %config.node_version,
                "node already installed"
            );
        } else {
            self.install_node(config)?;
        }
        self.ensure_npm(config, &toolchain)?;
        self.runner.run(&toolchain.npm(["ci"]))?;
        info!(
            target: DRIVERS_TARGET,
            version = %config.node_version,
            dir = %config.working_dir.display(),
            "dependencies installed"
        );
        Ok(())
    }

    fn stop(&self, _config: &NodeConfig) -> Result<(), DriverError> {
        Ok(())
    }

    fn handle(&self, config: &NodeConfig) -> Result<NodeToolchain, DriverError> {
        Ok(config.toolchain())
    }
}
