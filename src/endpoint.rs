//! Endpoint-spec parsing.
//!
//! An endpoint spec is a four-letter protocol/role tag followed by a
//! role-specific payload: `TCPS<port>`, `TCPC<host>,<port>`, `UDPS<port>`,
//! `UDPC<host>,<port>`. Parsing is pure; nothing here touches the network.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Transport protocol of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Whether this side listens or connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// A parsed endpoint specification.
///
/// `host` is `Some` exactly for client roles; server roles bind the wildcard
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub protocol: Protocol,
    pub role: Role,
    pub host: Option<String>,
    pub port: u16,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown protocol tag in '{0}' (expected TCPS, TCPC, UDPS or UDPC)")]
    UnknownProtocol(String),

    #[error("client endpoint '{0}' must be of the form <host>,<port>")]
    MalformedClientAddress(String),

    #[error("invalid port in '{0}' (expected 1-65535)")]
    InvalidPort(String),
}

impl FromStr for EndpointSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        let tag = s
            .get(..4)
            .ok_or_else(|| ParseError::UnknownProtocol(s.to_string()))?;
        let (protocol, role) = match tag {
            "TCPS" => (Protocol::Tcp, Role::Server),
            "TCPC" => (Protocol::Tcp, Role::Client),
            "UDPS" => (Protocol::Udp, Role::Server),
            "UDPC" => (Protocol::Udp, Role::Client),
            _ => return Err(ParseError::UnknownProtocol(s.to_string())),
        };

        let payload = &s[4..];
        let (host, port_str) = match role {
            Role::Server => (None, payload),
            Role::Client => {
                let (host, port) = payload
                    .split_once(',')
                    .ok_or_else(|| ParseError::MalformedClientAddress(s.to_string()))?;
                if host.is_empty() {
                    return Err(ParseError::MalformedClientAddress(s.to_string()));
                }
                (Some(host.to_string()), port)
            }
        };

        let port: u16 = port_str
            .parse()
            .map_err(|_| ParseError::InvalidPort(s.to_string()))?;
        if port == 0 {
            return Err(ParseError::InvalidPort(s.to_string()));
        }

        Ok(EndpointSpec {
            protocol,
            role,
            host,
            port,
        })
    }
}
