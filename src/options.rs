//! Contains the options and addressing types used to configure write execution.


use std::{
    fmt,
    hash::{Hash, Hasher},
    net::SocketAddr,
    str::FromStr,
    time::Duration,
};

use serde::{de::Error as SerdeError, Deserialize, Deserializer};
use typed_builder::TypedBuilder;

pub use crate::{
    coll::Namespace,
    concern::{Acknowledgment, AcknowledgmentOptions, WriteConcern},
    operation::{DeleteLimit, DeleteStatement, UpdateStatement, WriteRequest},
};
use crate::error::{Error, ErrorKind, Result};

pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 27017;

/// A hostname:port address pair identifying a server.
///
/// Two addresses are equal when their hosts match case-insensitively and their ports match, with
/// an absent port treated as 27017.
#[derive(Clone, Debug, Eq)]
pub struct ServerAddress {
    /// The hostname or IP address of the server.
    pub host: String,

    /// The port of the server.
    ///
    /// The default is 27017.
    pub port: Option<u16>,
}

impl<'de> Deserialize<'de> for ServerAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Self::parse(s.as_str()).map_err(|e| D::Error::custom(format!("{}", e)))
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: None,
        }
    }
}

impl PartialEq for ServerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.host.eq_ignore_ascii_case(&other.host) && self.port() == other.port()
    }
}

impl Hash for ServerAddress {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.host.to_ascii_lowercase().hash(state);
        self.port().hash(state);
    }
}

impl FromStr for ServerAddress {
    type Err = Error;

    fn from_str(address: &str) -> Result<Self> {
        Self::parse(address)
    }
}

impl ServerAddress {
    /// Creates an address for the given host and port.
    pub fn new(host: impl Into<String>, port: impl Into<Option<u16>>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// Parses an address string of the form `host[:port]` into a `ServerAddress`. An empty host
    /// means the default host.
    pub fn parse(address: impl AsRef<str>) -> Result<Self> {
        let address = address.as_ref();
        let mut parts = address.split(':');

        let host = match parts.next() {
            Some("") | None => DEFAULT_HOST,
            Some(part) => part,
        };

        let port = match parts.next() {
            Some(part) => {
                let port = u16::from_str(part).map_err(|_| invalid_host(address))?;
                if port == 0 || parts.next().is_some() {
                    return Err(invalid_host(address));
                }
                Some(port)
            }
            None => None,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// The port, falling back to the default when none was given.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Whether this address refers to the same server as `address`, given as `host[:port]`.
    pub fn same_host(&self, address: &str) -> bool {
        match Self::parse(address) {
            Ok(other) => *self == other,
            Err(_) => false,
        }
    }

    /// Resolves this address into the socket addresses it refers to.
    pub async fn to_socket_addrs(&self) -> Result<Vec<SocketAddr>> {
        let addrs = tokio::net::lookup_host((self.host.as_str(), self.port())).await?;
        let addrs: Vec<_> = addrs.collect();
        if addrs.is_empty() {
            return Err(invalid_host(&self.to_string()));
        }
        Ok(addrs)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}:{}", self.host, self.port())
    }
}

fn invalid_host(address: &str) -> Error {
    ErrorKind::InvalidArgument {
        message: format!("invalid server address: {:?}", address),
    }
    .into()
}

/// Options used when establishing and using a [`Connection`](crate::Connection).
#[derive(Clone, Debug, Default, TypedBuilder, PartialEq)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct ConnectionOptions {
    /// The amount of time to wait for a TCP connection to be established.
    pub connect_timeout: Option<Duration>,

    /// The amount of time a single send or receive may take before it fails with a timeout.
    ///
    /// The default is to wait indefinitely.
    pub socket_timeout: Option<Duration>,
}
