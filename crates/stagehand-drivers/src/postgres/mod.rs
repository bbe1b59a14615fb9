//! Containerised Postgres with Flyway migrations and a schema dump.
//!
//! Starting the database walks through these steps:
//!
//! 1. In compose mode, check the container engine answers `docker info`,
//!    bring the service up and ask compose which host port it published.
//!    In external mode the database is already there.
//! 2. Record the host and port in the connection file.
//! 3. Wait until the port accepts TCP connections.
//! 4. Apply the migrations with Flyway.
//! 5. Dump the resulting schema so changes show up in review.
//!
//! Steps 3 and 4 run under the retry policy because a freshly created
//! container needs a few seconds before it accepts connections.

mod compose;
mod connection;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stagehand_lifecycle::{DriverError, ResourceConfig, ResourceDriver, RetryPolicy};
use stagehand_process::{CommandRunner, CommandSpec, SystemRunner};
use tracing::{debug, info};

pub use self::compose::{ComposeService, PullPolicy};
pub use self::connection::{ConnectionParams, Credentials};

use self::compose::{CONTAINER_PORT, Compose, parse_port_binding};
use crate::DRIVERS_TARGET;
use crate::digest::hash_tree;

/// Driver kind, used for locking and the fingerprint file name.
pub const POSTGRES_KIND: &str = "postgres";

/// Timeout for a single TCP readiness probe.
const PORT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// A database provided outside the container engine, for example a CI
/// service container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDatabase {
    host: String,
    port: u16,
}

impl ExternalDatabase {
    /// Host and port of the running database.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host used when running under GitHub Actions.
    #[must_use]
    pub fn github_actions() -> Self {
        Self::new("localhost", CONTAINER_PORT)
    }

    /// Host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// Where the database comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostgresMode {
    /// Started and stopped through Docker Compose.
    Compose(ComposeService),
    /// Already running; never started or stopped.
    External(ExternalDatabase),
}

/// Everything that determines the running database and its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    mode: PostgresMode,
    migrations_dir: PathBuf,
    migrations: BTreeMap<String, String>,
    schema_dump: PathBuf,
    connection_file: PathBuf,
    credentials: Credentials,
}

impl ResourceConfig for PostgresConfig {}

impl PostgresConfig {
    /// Snapshots the migrations directory into a configuration.
    ///
    /// Every migration file contributes its SHA-256 so editing, adding or
    /// removing a migration changes the fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] when the migrations cannot be read.
    pub fn new(
        mode: PostgresMode,
        migrations_dir: &Path,
        schema_dump: impl Into<PathBuf>,
        connection_file: impl Into<PathBuf>,
    ) -> Result<Self, DriverError> {
        let absolute_migrations = std::path::absolute(migrations_dir)
            .map_err(|source| DriverError::io("resolve", migrations_dir, source))?;
        let migrations = hash_tree(&absolute_migrations)?;
        Ok(Self {
            mode,
            migrations_dir: absolute_migrations,
            migrations,
            schema_dump: schema_dump.into(),
            connection_file: connection_file.into(),
            credentials: Credentials::default(),
        })
    }

    /// Replaces the default `root`/`password`/`template1` credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Where the database comes from.
    #[must_use]
    pub const fn mode(&self) -> &PostgresMode {
        &self.mode
    }

    /// Absolute migrations directory.
    #[must_use]
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Relative migration path to SHA-256.
    #[must_use]
    pub const fn migrations(&self) -> &BTreeMap<String, String> {
        &self.migrations
    }

    /// Where the schema dump is written.
    #[must_use]
    pub fn schema_dump(&self) -> &Path {
        &self.schema_dump
    }

    /// Where host and port are recorded for other tools.
    #[must_use]
    pub fn connection_file(&self) -> &Path {
        &self.connection_file
    }

    /// Database credentials.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Starts, migrates and stops the database.
#[derive(Debug, Clone)]
pub struct PostgresDriver<R = SystemRunner> {
    runner: R,
    retry: RetryPolicy,
    docker: PathBuf,
    flyway: PathBuf,
    pg_dump: PathBuf,
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new(SystemRunner::new())
    }
}

impl<R: CommandRunner> PostgresDriver<R> {
    /// Creates a driver running commands through `runner`.
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            retry: RetryPolicy::default(),
            docker: PathBuf::from("docker"),
            flyway: PathBuf::from("flyway"),
            pg_dump: PathBuf::from("pg_dump"),
        }
    }

    /// Uses `retry` for readiness and migration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the host-side `docker`, `flyway` and `pg_dump` executables.
    #[must_use]
    pub fn with_programs(
        mut self,
        docker: impl Into<PathBuf>,
        flyway: impl Into<PathBuf>,
        pg_dump: impl Into<PathBuf>,
    ) -> Self {
        self.docker = docker.into();
        self.flyway = flyway.into();
        self.pg_dump = pg_dump.into();
        self
    }

    fn probe_engine(&self, compose: &Compose<'_>) -> Result<(), DriverError> {
        self.runner
            .run(&compose.info())
            .map(|_| ())
            .map_err(|error| DriverError::connectivity("the docker engine", error))
    }

    fn bring_up(&self, compose: &Compose<'_>) -> Result<(String, u16), DriverError> {
        self.probe_engine(compose)?;
        self.runner.run(&compose.up())?;
        let output = self.runner.run(&compose.port())?;
        output
            .stdout()
            .iter()
            .find_map(|line| parse_port_binding(line))
            .ok_or_else(|| {
                DriverError::configuration(format!(
                    "compose did not report a published port for {CONTAINER_PORT}: {:?}",
                    output.stdout()
                ))
            })
    }

    fn wait_for_port(&self, params: &ConnectionParams) -> Result<(), DriverError> {
        let target = format!("postgres at {}:{}", params.host(), params.port());
        self.retry.keep_trying("postgres port", || {
            probe_port(params.host(), params.port()).map_err(|source| DriverError::Unavailable {
                target: target.clone(),
                message: "port is not accepting connections".to_owned(),
                source: Some(Box::new(source)),
            })
        })
    }

    fn migrate(&self, config: &PostgresConfig, params: &ConnectionParams) -> Result<(), DriverError> {
        let spec = CommandSpec::new(&self.flyway).args([
            format!("-url={}", params.jdbc_url()),
            format!("-user={}", params.user()),
            format!("-password={}", params.password()),
            format!("-locations=filesystem:{}", config.migrations_dir.display()),
            "-schemas=public".to_owned(),
            "migrate".to_owned(),
        ]);
        self.retry.keep_trying("flyway migrate", || {
            self.runner.run(&spec).map(|_| ()).map_err(DriverError::from)
        })?;
        info!(
            target: DRIVERS_TARGET,
            migrations = config.migrations.len(),
            "migrations applied"
        );
        Ok(())
    }

    fn dump_schema(
        &self,
        config: &PostgresConfig,
        params: &ConnectionParams,
        compose: Option<&Compose<'_>>,
    ) -> Result<(), DriverError> {
        let dump_args = [
            "-d".to_owned(),
            params.database().to_owned(),
            "-U".to_owned(),
            params.user().to_owned(),
            "--schema-only".to_owned(),
            "--restrict-key=reproduciblediff".to_owned(),
        ];
        let spec = match compose {
            Some(engine) => engine.exec(std::iter::once("pg_dump".to_owned()).chain(dump_args)),
            None => CommandSpec::new(&self.pg_dump)
                .args(["-h".to_owned(), params.host().to_owned()])
                .args(["-p".to_owned(), params.port().to_string()])
                .args(dump_args)
                .env("PGPASSWORD", params.password()),
        };
        let schema = self.runner.run(&spec)?.stdout_text();
        write_file(&config.schema_dump, &schema)?;
        debug!(
            target: DRIVERS_TARGET,
            file = %config.schema_dump.display(),
            bytes = schema.len(),
            "schema dumped"
        );
        Ok(())
    }
}

impl<R: CommandRunner> ResourceDriver for PostgresDriver<R> {
    type Config = PostgresConfig;
    type Handle = ConnectionParams;

    fn kind(&self) -> &'static str {
        POSTGRES_KIND
    }

    fn start(&self, config: &PostgresConfig) -> Result<(), DriverError> {
        let (params, compose) = match &config.mode {
            PostgresMode::Compose(service) => {
                let engine = Compose::new(&self.docker, service);
                let (host, port) = self.bring_up(&engine)?;
                info!(
                    target: DRIVERS_TARGET,
                    project = %service.project_name(),
                    host = %host,
                    port,
                    "compose service up"
                );
                (
                    ConnectionParams::new(host, port, config.credentials.clone()),
                    Some(engine),
                )
            }
            PostgresMode::External(database) => {
                debug!(
                    target: DRIVERS_TARGET,
                    host = %database.host,
                    port = database.port,
                    "using external database"
                );
                (
                    ConnectionParams::new(
                        database.host.clone(),
                        database.port,
                        config.credentials.clone(),
                    ),
                    None,
                )
            }
        };

        params.write_to(&config.connection_file)?;
        self.wait_for_port(&params)?;
        self.migrate(config, &params)?;
        self.dump_schema(config, &params, compose.as_ref())
    }

    fn stop(&self, config: &PostgresConfig) -> Result<(), DriverError> {
        let PostgresMode::Compose(service) = &config.mode else {
            debug!(target: DRIVERS_TARGET, "external database left running");
            return Ok(());
        };
        let compose = Compose::new(&self.docker, service);
        self.probe_engine(&compose)?;
        self.runner.run(&compose.kill())?;
        self.runner.run(&compose.rm())?;
        info!(
            target: DRIVERS_TARGET,
            project = %service.project_name(),
            "compose service removed"
        );
        Ok(())
    }

    fn handle(&self, config: &PostgresConfig) -> Result<ConnectionParams, DriverError> {
        match &config.mode {
            PostgresMode::Compose(_) => {
                ConnectionParams::read_from(&config.connection_file, config.credentials.clone())
            }
            PostgresMode::External(database) => Ok(ConnectionParams::new(
                database.host.clone(),
                database.port,
                config.credentials.clone(),
            )),
        }
    }
}

fn probe_port(host: &str, port: u16) -> io::Result<()> {
    connect_any((host, port).to_socket_addrs()?)
}

/// Succeeds as soon as one of `addresses` accepts a connection.
///
/// A host such as `localhost` may resolve to `::1` first while the published
/// port is only bound on IPv4, so every candidate is tried.
fn connect_any(addresses: impl IntoIterator<Item = SocketAddr>) -> io::Result<()> {
    let mut last_error = None;
    for address in addresses {
        match TcpStream::connect_timeout(&address, PORT_PROBE_TIMEOUT) {
            Ok(_) => return Ok(()),
            Err(error) => last_error = Some(error),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved address")
    }))
}

fn write_file(path: &Path, contents: &str) -> Result<(), DriverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| DriverError::io("create", parent, source))?;
    }
    fs::write(path, contents).map_err(|source| DriverError::io("write", path, source))
}

#[cfg(test)]
mod tests;
