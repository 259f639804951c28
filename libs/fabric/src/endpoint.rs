use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

pub const INPROC_SCHEME: &str = "inproc://";
pub const TCP_SCHEME: &str = "tcp://";

/// Transport family of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Inproc,
    Tcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Inproc => write!(f, "inproc"),
            TransportKind::Tcp => write!(f, "tcp"),
        }
    }
}

/// Address of a socket
///
/// Parsed from `inproc://<name>` or `tcp://<host>:<port>`. A TCP host of `*`
/// binds every interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Inproc { name: String },
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    pub fn inproc(name: impl Into<String>) -> Self {
        Self::Inproc { name: name.into() }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn transport(&self) -> TransportKind {
        match self {
            Self::Inproc { .. } => TransportKind::Inproc,
            Self::Tcp { .. } => TransportKind::Tcp,
        }
    }

    /// Port of the endpoint; in-process endpoints resolve to 0
    pub fn port(&self) -> u16 {
        match self {
            Self::Inproc { .. } => 0,
            Self::Tcp { port, .. } => *port,
        }
    }

    /// Socket address string to bind a listener on
    pub fn bind_addr(&self) -> Option<String> {
        match self {
            Self::Inproc { .. } => None,
            Self::Tcp { host, port } if host == "*" => Some(format!("0.0.0.0:{port}")),
            Self::Tcp { host, port } => Some(format!("{host}:{port}")),
        }
    }

    /// Socket address string to connect to
    pub fn connect_addr(&self) -> Option<String> {
        match self {
            Self::Inproc { .. } => None,
            Self::Tcp { host, port } if host == "*" => Some(format!("127.0.0.1:{port}")),
            Self::Tcp { host, port } => Some(format!("{host}:{port}")),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inproc { name } => write!(f, "{INPROC_SCHEME}{name}"),
            Self::Tcp { host, port } => write!(f, "{TCP_SCHEME}{host}:{port}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Some(name) = input.strip_prefix(INPROC_SCHEME) {
            if name.is_empty() {
                return Err(Error::InvalidEndpoint(format!("missing inproc name in '{input}'")));
            }
            return Ok(Self::inproc(name));
        }

        let Some(address) = input.strip_prefix(TCP_SCHEME) else {
            return Err(Error::InvalidEndpoint(format!("unsupported scheme in '{input}'")));
        };
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidEndpoint(format!("missing TCP port in '{input}'")))?;
        if host.is_empty() {
            return Err(Error::InvalidEndpoint(format!("missing TCP host in '{input}'")));
        }
        let port = port
            .parse()
            .map_err(|_| Error::InvalidEndpoint(format!("invalid TCP port in '{input}'")))?;

        Ok(Self::tcp(host, port))
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
