use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Wildcard host accepted in `tcp://*:port` bind addresses.
pub const WILDCARD_HOST: &str = "*";

/// A parsed transport endpoint address.
///
/// Accepted forms:
/// ```text
/// tcp://127.0.0.1:4321     TCP, explicit host
/// tcp://*:4321             TCP, all interfaces (bind only)
/// tcp://[::1]:4321         TCP, IPv6 literal
/// ipc:///tmp/router.sock   Unix domain socket
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Ipc(PathBuf),
}

impl Endpoint {
    /// Parse an endpoint address.
    pub fn parse(address: &str) -> Result<Self> {
        let invalid = |reason: &str| TransportError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = address
            .split_once("://")
            .ok_or_else(|| invalid("missing '<scheme>://' prefix"))?;

        match scheme {
            "tcp" => {
                let (host, port) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| invalid("missing port"))?;
                let host = host
                    .strip_prefix('[')
                    .and_then(|h| h.strip_suffix(']'))
                    .unwrap_or(host);
                if host.is_empty() {
                    return Err(invalid("missing host"));
                }
                let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
                Ok(Self::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            "ipc" => {
                if !cfg!(unix) {
                    return Err(invalid("ipc endpoints require Unix domain sockets"));
                }
                if rest.is_empty() {
                    return Err(invalid("missing socket path"));
                }
                Ok(Self::Ipc(PathBuf::from(rest)))
            }
            _ => Err(invalid("unsupported scheme (expected tcp or ipc)")),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "tcp",
            Self::Ipc(_) => "unix-domain-socket",
        }
    }

    /// `host:port` string suitable for socket APIs, mapping the wildcard host
    /// to the unspecified IPv4 address.
    pub(crate) fn socket_addr_string(&self) -> Option<String> {
        match self {
            Self::Tcp { host, port } if host == WILDCARD_HOST => Some(format!("0.0.0.0:{port}")),
            Self::Tcp { host, port } if host.contains(':') => Some(format!("[{host}]:{port}")),
            Self::Tcp { host, port } => Some(format!("{host}:{port}")),
            Self::Ipc(_) => None,
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}
