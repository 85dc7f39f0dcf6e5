/// Server addresses as seen by the tracker

use crate::error::{ClusterError, ClusterResult};
use std::fmt;
use std::str::FromStr;

/// Host and port of one server in the deployment
///
/// Hosts are case-insensitive, so they are stored lower-cased: `DB1:27017` and
/// `db1:27017` name the same registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub const DEFAULT_PORT: u16 = 27017;

    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            port,
        }
    }

    /// Parse `host`, `host:port` or `[ipv6]:port`
    pub fn parse(input: &str) -> ClusterResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ClusterError::invalid_address(input, "empty host"));
        }

        let (host, port) = if let Some(rest) = trimmed.strip_prefix('[') {
            let end = rest
                .find(']')
                .ok_or_else(|| ClusterError::invalid_address(input, "unterminated IPv6 literal"))?;
            let host = &rest[..end];
            let port = match &rest[end + 1..] {
                "" => None,
                tail => Some(tail.strip_prefix(':').ok_or_else(|| {
                    ClusterError::invalid_address(input, "expected ':' after IPv6 literal")
                })?),
            };
            (host, port)
        } else {
            match trimmed.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => {
                    return Err(ClusterError::invalid_address(
                        input,
                        "IPv6 literals must be enclosed in brackets",
                    ))
                }
                Some((host, port)) => (host, Some(port)),
                None => (trimmed, None),
            }
        };

        if host.is_empty() {
            return Err(ClusterError::invalid_address(input, "empty host"));
        }

        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| ClusterError::invalid_address(input, format!("invalid port: {}", e)))?,
            None => Self::DEFAULT_PORT,
        };

        Ok(Self::new(host, port))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for ServerAddress {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
