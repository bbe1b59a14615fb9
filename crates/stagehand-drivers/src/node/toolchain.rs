//! Running npm against an installed toolchain.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use stagehand_process::{CommandRunner, CommandSpec, ProcessError, ProcessOutput};
use tracing::info;

use crate::DRIVERS_TARGET;

/// An installed Node.js distribution bound to a project directory.
///
/// Every command built here runs in the project directory with the
/// distribution's `bin` directory first on `PATH`, so `npm` scripts resolve
/// the pinned `node` rather than whatever the host provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeToolchain {
    install_dir: PathBuf,
    working_dir: PathBuf,
}

impl NodeToolchain {
    /// Binds the distribution in `install_dir` to `working_dir`.
    pub fn new(install_dir: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Directory holding `node` and `npm`.
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir.join("bin")
    }

    /// Project directory commands run in.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Path of the `node` executable.
    #[must_use]
    pub fn node_program(&self) -> PathBuf {
        self.bin_dir().join("node")
    }

    /// Path of the `npm` executable.
    #[must_use]
    pub fn npm_program(&self) -> PathBuf {
        self.bin_dir().join("npm")
    }

    /// `PATH` with the distribution's `bin` directory prepended.
    #[must_use]
    pub fn search_path(&self) -> String {
        let inherited = env::var_os("PATH").unwrap_or_default();
        let entries = std::iter::once(self.bin_dir()).chain(env::split_paths(&inherited));
        env::join_paths(entries).map_or_else(
            |_| self.bin_dir().to_string_lossy().into_owned(),
            |joined| joined.to_string_lossy().into_owned(),
        )
    }

    /// `node` invocation.
    pub fn node<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prepare(CommandSpec::new(self.node_program()).args(args))
    }

    /// `npm` invocation.
    pub fn npm<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prepare(CommandSpec::new(self.npm_program()).args(args))
    }

    /// Runs `npm run <script>` with `extra_env` added to the environment.
    ///
    /// # Errors
    ///
    /// Returns the [`ProcessError`] when npm cannot be launched or the script
    /// fails; the error carries the full transcript.
    pub fn run_script<R: CommandRunner + ?Sized>(
        &self,
        runner: &R,
        script: &str,
        extra_env: &BTreeMap<String, String>,
    ) -> Result<ProcessOutput, ProcessError> {
        let spec = self
            .npm(["run", script])
            .envs(extra_env.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        info!(target: DRIVERS_TARGET, script, "running npm script");
        runner.run(&spec)
    }

    fn prepare(&self, spec: CommandSpec) -> CommandSpec {
        spec.current_dir(&self.working_dir)
            .env("PATH", self.search_path())
    }
}
