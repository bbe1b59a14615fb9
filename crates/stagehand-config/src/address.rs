//! `host:port` addresses for databases provided outside the container engine.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when parsing a [`DatabaseAddress`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// The value did not contain a `:` separator.
    #[error("database address '{0}' must be written as host:port")]
    MissingPort(String),
    /// The host part was empty.
    #[error("database address '{0}' has an empty host")]
    EmptyHost(String),
    /// The port was not a number in range.
    #[error("database address '{address}' has an invalid port '{port}'")]
    InvalidPort {
        /// Full address text.
        address: String,
        /// Port text that failed to parse.
        port: String,
    },
}

/// Host and port of an externally managed Postgres server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseAddress {
    host: String,
    port: u16,
}

impl DatabaseAddress {
    /// Creates an address from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for DatabaseAddress {
    type Err = AddressParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| AddressParseError::MissingPort(trimmed.to_owned()))?;
        let bare_host = host.trim_start_matches('[').trim_end_matches(']');
        if bare_host.is_empty() {
            return Err(AddressParseError::EmptyHost(trimmed.to_owned()));
        }
        let number = port.parse().map_err(|_| AddressParseError::InvalidPort {
            address: trimmed.to_owned(),
            port: port.to_owned(),
        })?;
        Ok(Self::new(bare_host, number))
    }
}

impl fmt::Display for DatabaseAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(formatter, "[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "{}:{}", self.host, self.port)
        }
    }
}
