//! Authority (`host[:port]`) parsing.

use crate::error::ProxyError;

/// A resolved host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    /// Host name or address literal, without IPv6 brackets.
    pub host: String,
    pub port: u16,
}

impl HostPort {
    /// Form suitable for `TcpStream::connect`.
    pub fn connect_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl std::fmt::Display for HostPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Split an authority into host and port.
///
/// Accepts `host`, `host:port`, `[v6]` and `[v6]:port`. A missing port takes
/// `default_port`. An unbracketed value with more than one colon is rejected.
pub fn parse_authority(value: &str, default_port: u16) -> Result<HostPort, ProxyError> {
    let invalid = || ProxyError::InvalidAuthority(value.to_string());

    if let Some(rest) = value.strip_prefix('[') {
        let end = rest.find(']').ok_or_else(invalid)?;
        let host = &rest[..end];
        let port = match &rest[end + 1..] {
            "" => default_port,
            tail => {
                let digits = tail.strip_prefix(':').ok_or_else(invalid)?;
                parse_port(digits).ok_or_else(invalid)?
            }
        };
        return Ok(HostPort {
            host: host.to_string(),
            port,
        });
    }

    match value.split_once(':') {
        None => Ok(HostPort {
            host: value.to_string(),
            port: default_port,
        }),
        Some((host, digits)) => {
            let port = parse_port(digits).ok_or_else(invalid)?;
            Ok(HostPort {
                host: host.to_string(),
                port,
            })
        }
    }
}

fn parse_port(digits: &str) -> Option<u16> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
