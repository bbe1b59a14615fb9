//! Wires configuration into the lifecycle coordinator and drivers.

use std::collections::BTreeMap;
use std::env;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use stagehand_config::Config;
use stagehand_drivers::{
    ComposeService, ExternalDatabase, NodeConfig, NodeDriver, NodeToolchain, NpmVersion,
    PostgresConfig, PostgresDriver, PostgresMode, PullPolicy,
};
use stagehand_lifecycle::{Lifecycle, RetryPolicy, RetryWindow};
use tracing::{info, warn};

use crate::cli::{CliCommand, DbAction, NodeAction};
use crate::{AppError, CLI_TARGET};

/// Set by GitHub Actions; jobs there provide Postgres as a service container.
const GITHUB_ACTIONS: &str = "GITHUB_ACTIONS";

/// Resolved settings for one invocation.
pub(crate) struct Workspace {
    config: Config,
    lifecycle: Lifecycle,
    retry: RetryPolicy,
}

impl Workspace {
    /// Pins the work directory to an absolute path and builds the coordinator.
    pub(crate) fn from_config(config: &Config) -> Result<Self, AppError> {
        let relative = config.work_dir();
        let absolute = std::path::absolute(relative.as_std_path())
            .map_err(|source| AppError::WorkDir {
                path: relative.to_path_buf(),
                source,
            })
            .and_then(|path| {
                Utf8PathBuf::try_from(path).map_err(|error| AppError::WorkDir {
                    path: relative.to_path_buf(),
                    source: error.into_io_error(),
                })
            })?;
        let resolved = Config {
            work_dir: Some(absolute),
            ..config.clone()
        };
        let lifecycle = Lifecycle::new(resolved.state_dir().into_std_path_buf());
        let retry = RetryPolicy::new(RetryWindow::new(
            resolved.retry_silent(),
            resolved.retry_loud(),
            resolved.retry_poll(),
        ));
        Ok(Self {
            config: resolved,
            lifecycle,
            retry,
        })
    }

    pub(crate) fn execute<W: Write>(
        &self,
        command: &CliCommand,
        stdout: &mut W,
    ) -> Result<(), AppError> {
        match command {
            CliCommand::Db { action } => match action {
                DbAction::Up => self.db_up(stdout),
                DbAction::Down => self.db_down(stdout),
                DbAction::Status => self.db_status(stdout),
            },
            CliCommand::Node { action } => match action {
                NodeAction::Install => self.node_install(stdout),
                NodeAction::Run { script, env } => {
                    let extra_env: BTreeMap<String, String> = env.iter().cloned().collect();
                    self.node_run(script, &extra_env, stdout)
                }
            },
        }
    }

    fn postgres_driver(&self) -> PostgresDriver {
        PostgresDriver::default().with_retry(self.retry)
    }

    fn postgres_mode(&self) -> Result<PostgresMode, AppError> {
        if let Some(address) = self.config.external_database()? {
            return Ok(PostgresMode::External(ExternalDatabase::new(
                address.host(),
                address.port(),
            )));
        }
        if env::var_os(GITHUB_ACTIONS).is_some_and(|value| value == "true") {
            return Ok(PostgresMode::External(ExternalDatabase::github_actions()));
        }
        let pull = if self.config.skip_pull() {
            PullPolicy::Missing
        } else {
            PullPolicy::Always
        };
        let service = ComposeService::new(
            self.config.compose_file().as_std_path(),
            self.config.compose_service(),
            pull,
        )?;
        Ok(PostgresMode::Compose(service))
    }

    fn postgres_config(&self) -> Result<PostgresConfig, AppError> {
        let config = PostgresConfig::new(
            self.postgres_mode()?,
            self.config.migrations_dir().as_std_path(),
            self.config.schema_dump().into_std_path_buf(),
            self.config.connection_file().into_std_path_buf(),
        )?;
        Ok(config)
    }

    fn db_up<W: Write>(&self, stdout: &mut W) -> Result<(), AppError> {
        let config = self.postgres_config()?;
        let params = self
            .lifecycle
            .ensure_ready(&self.postgres_driver(), &config)?;
        writeln!(stdout, "{}", params.render()).map_err(AppError::Output)
    }

    fn db_down<W: Write>(&self, stdout: &mut W) -> Result<(), AppError> {
        let driver = self.postgres_driver();
        let config = match self.lifecycle.recorded(&driver) {
            Ok(Some(recorded)) => recorded,
            Ok(None) => self.postgres_config()?,
            Err(error) => {
                warn!(
                    target: CLI_TARGET,
                    error = %error,
                    "recorded configuration unreadable; stopping the current one"
                );
                self.postgres_config()?
            }
        };
        self.lifecycle.force_stop(&driver, &config)?;
        writeln!(stdout, "postgres: stopped").map_err(AppError::Output)
    }

    fn db_status<W: Write>(&self, stdout: &mut W) -> Result<(), AppError> {
        let line = match self.lifecycle.recorded(&self.postgres_driver())? {
            None => "postgres: not started".to_owned(),
            Some(recorded) => match recorded.mode() {
                PostgresMode::Compose(service) => format!(
                    "postgres: started (compose project {}, service {})",
                    service.project_name(),
                    service.service()
                ),
                PostgresMode::External(database) => format!(
                    "postgres: started (external {}:{})",
                    database.host(),
                    database.port()
                ),
            },
        };
        writeln!(stdout, "{line}").map_err(AppError::Output)
    }

    fn node_config(&self) -> Result<NodeConfig, AppError> {
        let npm_version = self
            .config
            .npm_version()
            .parse::<NpmVersion>()
            .unwrap_or_default();
        let config = NodeConfig::discover(
            self.config.work_dir().as_std_path(),
            self.config.node_install_dir().map(Utf8Path::as_std_path),
            npm_version,
        )?;
        Ok(config)
    }

    fn ensure_node(&self, driver: &NodeDriver) -> Result<(NodeConfig, NodeToolchain), AppError> {
        let config = self.node_config()?;
        let toolchain = self.lifecycle.ensure_ready(driver, &config)?;
        Ok((config, toolchain))
    }

    fn node_install<W: Write>(&self, stdout: &mut W) -> Result<(), AppError> {
        let (config, toolchain) = self.ensure_node(&NodeDriver::default())?;
        writeln!(
            stdout,
            "node {} ready in {}",
            config.node_version(),
            toolchain.bin_dir().display()
        )
        .map_err(AppError::Output)
    }

    fn node_run<W: Write>(
        &self,
        script: &str,
        extra_env: &BTreeMap<String, String>,
        stdout: &mut W,
    ) -> Result<(), AppError> {
        let driver = NodeDriver::default();
        let (_, toolchain) = self.ensure_node(&driver)?;
        let output = toolchain.run_script(driver.runner(), script, extra_env)?;
        info!(target: CLI_TARGET, script, "npm script finished");
        for line in output.stdout() {
            writeln!(stdout, "{line}").map_err(AppError::Output)?;
        }
        Ok(())
    }
}
