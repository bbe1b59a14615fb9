//! Connection parameters handed to database clients.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stagehand_lifecycle::DriverError;

/// Role, password and database used for migrations and dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    user: String,
    password: String,
    database: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: "root".to_owned(),
            password: "password".to_owned(),
            database: "template1".to_owned(),
        }
    }
}

impl Credentials {
    /// Builds a credential set.
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    /// Role name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Role password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }
}

/// Where and as whom to connect to the running database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    host: String,
    port: u16,
    credentials: Credentials,
}

impl ConnectionParams {
    /// Builds parameters for `host:port`.
    pub fn new(host: impl Into<String>, port: u16, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port,
            credentials,
        }
    }

    /// Host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Published port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Role name.
    #[must_use]
    pub fn user(&self) -> &str {
        self.credentials.user()
    }

    /// Role password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.credentials.password()
    }

    /// Database name.
    #[must_use]
    pub fn database(&self) -> &str {
        self.credentials.database()
    }

    /// JDBC URL as expected by Flyway.
    #[must_use]
    pub fn jdbc_url(&self) -> String {
        format!(
            "jdbc:postgresql://{}:{}/{}",
            self.host,
            self.port,
            self.database()
        )
    }

    /// libpq connection URI.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user(),
            self.password(),
            self.host,
            self.port,
            self.database()
        )
    }

    /// Renders the `key=value` connection file body.
    #[must_use]
    pub fn render(&self) -> String {
        format!("host={}\nport={}", self.host, self.port)
    }

    /// Writes the connection file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] when the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), DriverError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| DriverError::io("create", parent, source))?;
        }
        fs::write(path, self.render()).map_err(|source| DriverError::io("write", path, source))
    }

    /// Reads a connection file written by [`Self::write_to`].
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] when the file cannot be read and
    /// [`DriverError::Configuration`] when `host` or `port` is missing or
    /// malformed.
    pub fn read_from(path: &Path, credentials: Credentials) -> Result<Self, DriverError> {
        let body =
            fs::read_to_string(path).map_err(|source| DriverError::io("read", path, source))?;
        Self::parse(&body, credentials).map_err(|message| {
            DriverError::configuration(format!("{}: {message}", path.display()))
        })
    }

    fn parse(body: &str, credentials: Credentials) -> Result<Self, String> {
        let mut host = None;
        let mut port = None;
        for line in body.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(format!("malformed line '{line}'"));
            };
            match key.trim() {
                "host" => host = Some(value.trim().to_owned()),
                "port" => {
                    let parsed = value
                        .trim()
                        .parse::<u16>()
                        .map_err(|error| format!("invalid port '{}': {error}", value.trim()))?;
                    port = Some(parsed);
                }
                _ => {}
            }
        }
        let host = host.ok_or("missing host")?;
        let port = port.ok_or("missing port")?;
        Ok(Self::new(host, port, credentials))
    }
}
