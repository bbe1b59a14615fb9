//! Docker Compose command lines for the database service.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stagehand_lifecycle::DriverError;
use stagehand_process::CommandSpec;

use crate::digest::sha256_hex;

/// Port Postgres listens on inside the container.
pub(crate) const CONTAINER_PORT: u16 = 5432;

/// Number of hash characters kept in the compose project name.
const PROJECT_HASH_LEN: usize = 12;

/// Whether `up` pulls images before starting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullPolicy {
    /// Always pull, picking up moved tags.
    #[default]
    Always,
    /// Pull only images that are not present locally.
    Missing,
}

impl PullPolicy {
    /// Value passed to `docker compose up --pull`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Missing => "missing",
        }
    }
}

/// The compose file and service that provide the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeService {
    file: PathBuf,
    service: String,
    pull: PullPolicy,
}

impl ComposeService {
    /// Describes `service` in the compose `file`.
    ///
    /// The file path is made absolute so the derived project name does not
    /// depend on the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] when the path cannot be made absolute.
    pub fn new(
        compose_file: &Path,
        service: impl Into<String>,
        pull: PullPolicy,
    ) -> Result<Self, DriverError> {
        let file = std::path::absolute(compose_file)
            .map_err(|source| DriverError::io("resolve", compose_file, source))?;
        Ok(Self {
            file,
            service: service.into(),
            pull,
        })
    }

    /// Absolute compose file path.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Service name inside the compose file.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Image pull policy.
    #[must_use]
    pub const fn pull(&self) -> PullPolicy {
        self.pull
    }

    /// Compose project name derived from the compose file path.
    ///
    /// Projects started from different checkouts never collide, and the same
    /// checkout always maps to the same project.
    #[must_use]
    pub fn project_name(&self) -> String {
        let digest = sha256_hex(self.file.to_string_lossy().as_bytes());
        let short: String = digest.chars().take(PROJECT_HASH_LEN).collect();
        format!("stagehand-{short}")
    }
}

/// Builds compose invocations for one service.
pub(crate) struct Compose<'a> {
    docker: &'a Path,
    service: &'a ComposeService,
}

impl<'a> Compose<'a> {
    pub(crate) const fn new(docker: &'a Path, service: &'a ComposeService) -> Self {
        Self { docker, service }
    }

    /// `docker info`, used to check the engine is reachable.
    pub(crate) fn info(&self) -> CommandSpec {
        CommandSpec::new(self.docker).arg("info")
    }

    pub(crate) fn up(&self) -> CommandSpec {
        self.base().args([
            "up",
            "--detach",
            "--force-recreate",
            "--remove-orphans",
            "--pull",
            self.service.pull.as_str(),
        ])
    }

    pub(crate) fn port(&self) -> CommandSpec {
        self.base()
            .arg("port")
            .arg(self.service.service.as_str())
            .arg(CONTAINER_PORT.to_string())
    }

    /// Runs `command` inside the service container without a TTY.
    pub(crate) fn exec<I, S>(&self, command: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base()
            .args(["exec", "-T"])
            .arg(self.service.service.as_str())
            .args(command)
    }

    pub(crate) fn kill(&self) -> CommandSpec {
        self.base().arg("kill")
    }

    pub(crate) fn rm(&self) -> CommandSpec {
        self.base().args(["rm", "--force"])
    }

    fn base(&self) -> CommandSpec {
        CommandSpec::new(self.docker)
            .arg("compose")
            .arg("-f")
            .arg(self.service.file.to_string_lossy())
            .arg("-p")
            .arg(self.service.project_name())
    }
}

/// Parses `docker compose port` output such as `0.0.0.0:55001`.
///
/// Wildcard bind addresses are reported as `localhost`.
pub(crate) fn parse_port_binding(line: &str) -> Option<(String, u16)> {
    let (raw_host, raw_port) = line.trim().rsplit_once(':')?;
    let port = raw_port.parse().ok()?;
    let host = match raw_host.trim_start_matches('[').trim_end_matches(']') {
        "" | "0.0.0.0" | "::" => "localhost",
        other => other,
    };
    Some((host.to_owned(), port))
}
