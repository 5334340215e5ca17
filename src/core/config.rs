//! Purpose: Connection inputs passed through the engine to a connector.
//! Exports: `Vendor`, `ServerConfiguration`, `Database`, `Endpoint`.
//! Role: Opaque to the engine; only connectors interpret URL and database identifier.
//! Invariants: Default server is Redis on `localhost:6379`.
//! Invariants: Cluster URL lists and embedded credentials are rejected (non-goals).
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_URL: &str = "localhost:6379";
pub const DEFAULT_PORT: u16 = 6379;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    #[default]
    Redis,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    pub vendor: Vendor,
    pub url: String,
}

impl ServerConfiguration {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            vendor: Vendor::Redis,
            url: url.into(),
        }
    }

    /// Parses `url` into a single host and port.
    pub fn endpoint(&self) -> Result<Endpoint, Error> {
        Endpoint::parse(&self.url)
    }
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub identifier: String,
}

impl Database {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    /// Numeric database index, as used by `SELECT`.
    pub fn index(&self) -> Result<u32, Error> {
        let trimmed = self.identifier.trim();
        trimmed.parse::<u32>().map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid database identifier `{}`", self.identifier))
                .with_hint("Databases are numbered from 0, for example `--db 1`.")
                .with_source(err)
        })
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new("0")
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("server url is empty")
                .with_hint(format!("Use a host:port value like {DEFAULT_URL}.")));
        }
        if input.contains(',') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("cluster server lists are not supported")
                .with_hint("Point --url at a single node."));
        }

        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("redis://{input}")
        };
        let url = Url::parse(&with_scheme).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid server url `{input}`"))
                .with_source(err)
        })?;
        if url.scheme() != "redis" {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported url scheme `{}`", url.scheme()))
                .with_hint("Use redis://host:port or host:port."));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("credentials in the server url are not supported"));
        }
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage).with_message(format!("server url `{input}` has no host"))
            })?;
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Database, Endpoint, ServerConfiguration, Vendor};
    use crate::core::error::ErrorKind;

    #[test]
    fn default_configuration_targets_local_redis() {
        let config = ServerConfiguration::default();
        assert_eq!(config.vendor, Vendor::Redis);
        let endpoint = config.endpoint().expect("endpoint");
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 6379);
    }

    #[test]
    fn endpoint_accepts_scheme_and_bare_host() {
        let endpoint = Endpoint::parse("redis://cache.internal:7000").expect("endpoint");
        assert_eq!(endpoint.to_string(), "cache.internal:7000");
        let endpoint = Endpoint::parse("cache.internal").expect("endpoint");
        assert_eq!(endpoint.port, 6379);
    }

    #[test]
    fn endpoint_handles_ipv6() {
        let endpoint = Endpoint::parse("[::1]:6380").expect("endpoint");
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.to_string(), "[::1]:6380");
    }

    #[test]
    fn endpoint_rejects_cluster_lists() {
        let err = Endpoint::parse("a:7000,b:7001").expect_err("cluster");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn endpoint_rejects_credentials() {
        let err = Endpoint::parse("redis://:secret@localhost:6379").expect_err("auth");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn endpoint_rejects_other_schemes() {
        let err = Endpoint::parse("http://localhost:6379").expect_err("scheme");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn database_index_parses_decimal() {
        assert_eq!(Database::new("3").index().expect("index"), 3);
        let err = Database::new("main").index().expect_err("name");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
